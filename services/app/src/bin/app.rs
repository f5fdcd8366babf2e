//! services/app/src/bin/app.rs

use app_lib::{
    adapters::{FileStateStore, HttpClassifierAdapter, HttpFeedbackAdapter, HttpIdentityAdapter},
    config::Config,
    error::AppError,
    AnalysisWorkflow, FeedbackCollector, PromptOutcome, SessionManager, SharedSession,
    SubmitOutcome, UiEvent, UsageGate,
};
use newscheck_core::domain::Session;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting client...");

    // --- 2. Build the HTTP Client & Service Adapters ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        // The refresh credential rides along as an ambient cookie.
        .cookie_store(true)
        .build()
        .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

    let store = Arc::new(FileStateStore::new(config.state_path.clone()));
    let identity = Arc::new(HttpIdentityAdapter::new(
        http.clone(),
        config.api_base_url.clone(),
    ));
    let classifier = Arc::new(HttpClassifierAdapter::new(
        http.clone(),
        config.api_base_url.clone(),
    ));
    let feedback = Arc::new(HttpFeedbackAdapter::new(http, config.api_base_url.clone()));

    // --- 3. Wire the Shared Session and Components ---
    let session: SharedSession = Arc::new(Mutex::new(Session::empty()));
    let gate = Arc::new(UsageGate::new(store.clone()));
    let manager = SessionManager::new(identity, store, session.clone(), gate.clone());
    manager.restore();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let workflow = AnalysisWorkflow::new(
        classifier,
        session.clone(),
        gate,
        events_tx,
        config.feedback_prompt_delay,
    );
    let collector = FeedbackCollector::new(feedback, session);

    // --- 4. Interactive Loop ---
    println!("newscheck — paste a passage to check its credibility");
    print_help();
    if let Some(user) = manager.current_user() {
        println!("signed in as {} ({})", user.name, user.email);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (command, rest) = match line.split_once(' ') {
                    Some((command, rest)) => (command, rest.trim()),
                    None => (line, ""),
                };
                match command {
                    "quit" | "exit" => break,
                    "help" => print_help(),
                    _ => run_command(command, rest, &manager, &workflow, &collector).await,
                }
            }
            Some(event) = events_rx.recv() => {
                report_event(event, &collector);
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("commands:");
    println!("  analyze <text>            classify a passage (50+ words)");
    println!("  clear                     discard the current result");
    println!("  rate <analysis-id> <1-5>  rate the last analysis");
    println!("  login <email> <password>");
    println!("  signup <email> <password> <name>");
    println!("  logout | whoami | refresh");
    println!("  forgot <email>            request a password reset link");
    println!("  resetpw <token> <new-password>");
    println!("  help | quit");
}

async fn run_command(
    command: &str,
    rest: &str,
    manager: &SessionManager,
    workflow: &AnalysisWorkflow,
    collector: &FeedbackCollector,
) {
    match command {
        "analyze" => match workflow.submit(rest).await {
            Ok(SubmitOutcome::Completed(result)) => {
                println!(
                    "verdict: {:?} (confidence {:.0}%) — analysis id {}",
                    result.label,
                    result.confidence * 100.0,
                    result.prediction_id
                );
            }
            Ok(SubmitOutcome::RequiresSignup) => {
                println!("guest limit reached — sign up (or log in) to keep analyzing");
            }
            Ok(SubmitOutcome::Discarded) => {}
            Err(e) => println!("error: {e}"),
        },
        "clear" => {
            workflow.clear();
            println!("cleared");
        }
        "rate" => {
            let (id, rating) = match rest.split_once(' ') {
                Some((id, rating)) => (id.trim(), rating.trim()),
                None => {
                    println!("usage: rate <analysis-id> <1-5>");
                    return;
                }
            };
            let rating = rating.parse::<u8>().unwrap_or(0);
            match collector.submit(id, rating).await {
                Ok(()) => println!("Thanks for your feedback!"),
                Err(e) => println!("error: {e}"),
            }
        }
        "login" => match rest.split_once(' ') {
            Some((email, password)) => match manager.login(email.trim(), password.trim()).await {
                Ok(user) => println!("welcome back, {}", user.name),
                Err(e) => println!("error: {e}"),
            },
            None => println!("usage: login <email> <password>"),
        },
        "signup" => {
            let mut parts = rest.splitn(3, ' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(email), Some(password), Some(name)) => {
                    match manager.signup(email, password, name).await {
                        Ok(user) => println!("welcome, {}", user.name),
                        Err(e) => println!("error: {e}"),
                    }
                }
                _ => println!("usage: signup <email> <password> <name>"),
            }
        }
        "logout" => {
            manager.logout();
            println!("logged out");
        }
        "whoami" => match manager.current_user() {
            Some(user) => println!("{} ({}, {:?})", user.name, user.email, user.role),
            None => println!("browsing as a guest"),
        },
        "refresh" => match manager.refresh().await {
            Ok(()) => println!("session renewed"),
            Err(e) => println!("error: {e}"),
        },
        "forgot" => match manager.request_password_reset(rest).await {
            Ok(()) => println!("If that email exists, a reset link has been sent."),
            Err(e) => println!("error: {e}"),
        },
        "resetpw" => match rest.split_once(' ') {
            Some((token, password)) => {
                match manager.reset_password(token.trim(), password.trim()).await {
                    Ok(()) => println!("Password reset successful. You can log in now."),
                    Err(e) => println!("error: {e}"),
                }
            }
            None => println!("usage: resetpw <token> <new-password>"),
        },
        _ => println!("unknown command '{command}' — try 'help'"),
    }
}

fn report_event(event: UiEvent, collector: &FeedbackCollector) {
    match event {
        UiEvent::AnalysisStarted => println!("analyzing..."),
        UiEvent::AnalysisCompleted { .. } | UiEvent::AnalysisFailed { .. } => {
            // The submit call already reported these inline.
        }
        UiEvent::SignupRequired => {
            println!("(use 'signup <email> <password> <name>' to create an account)");
        }
        UiEvent::FeedbackPromptDue { analysis_id } => {
            match collector.prompt_for_rating(&analysis_id) {
                PromptOutcome::RatingRequested { analysis_id } => {
                    println!("How was your experience? Rate it with: rate {analysis_id} <1-5>");
                }
                PromptOutcome::SigninRequired => {
                    println!("You must be logged in to submit feedback.");
                }
            }
        }
    }
}
