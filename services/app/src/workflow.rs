//! services/app/src/workflow.rs
//!
//! The analysis workflow: drives one classification request to completion,
//! holds the single live result, and schedules the deferred feedback prompt.
//!
//! At most one request is in flight per workflow instance, and at most one
//! result is live at a time. The feedback prompt is a cancellable timer, not
//! a fire-and-forget sleep: every exit from the awaiting state cancels it
//! explicitly, and a firing that lost the race is dropped as a no-op.

use std::sync::Arc;
use std::time::Duration;

use newscheck_core::domain::AnalysisResult;
use newscheck_core::ports::{ClassificationService, PortError, PortResult};
use newscheck_core::validate::validate_article_text;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::gate::UsageGate;
use crate::protocol::UiEvent;
use crate::session::SharedSession;

//=========================================================================================
// Workflow States and Outcomes
//=========================================================================================

/// The current phase of the workflow's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing submitted, or the input was cleared.
    Idle,
    /// A classification request is outstanding.
    Submitting,
    /// The usage gate refused the attempt; the UI routes to signup.
    Blocked,
    /// The last attempt failed; the workflow is re-submittable.
    Failed,
    /// A result is live and the deferred feedback prompt is armed.
    AwaitingFeedback,
    /// The feedback prompt has fired.
    Prompted,
    /// The feedback prompt was dismissed or never answered.
    Abandoned,
}

/// What a `submit` call produced, other than an error.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The analysis completed; the result is now live.
    Completed(AnalysisResult),
    /// The gate refused the attempt. Hand control to the signup flow.
    RequiresSignup,
    /// The workflow was cleared while the request was in flight; the late
    /// completion was thrown away.
    Discarded,
}

/// Handle for the armed prompt timer. Dropping the handle alone is not
/// cancellation; the token must be cancelled explicitly.
struct PromptTimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct WorkflowState {
    phase: Phase,
    result: Option<AnalysisResult>,
    in_flight: bool,
    /// Bumped on every `clear`, so completions and timer firings belonging to
    /// an abandoned run can recognize themselves as stale.
    generation: u64,
    prompt: Option<PromptTimer>,
}

fn cancel_prompt(state: &mut WorkflowState) {
    if let Some(timer) = state.prompt.take() {
        timer.token.cancel();
        timer.task.abort();
    }
}

//=========================================================================================
// The Workflow Engine
//=========================================================================================

pub struct AnalysisWorkflow {
    classifier: Arc<dyn ClassificationService>,
    session: SharedSession,
    gate: Arc<UsageGate>,
    state: Arc<Mutex<WorkflowState>>,
    events: UnboundedSender<UiEvent>,
    prompt_delay: Duration,
}

impl AnalysisWorkflow {
    pub fn new(
        classifier: Arc<dyn ClassificationService>,
        session: SharedSession,
        gate: Arc<UsageGate>,
        events: UnboundedSender<UiEvent>,
        prompt_delay: Duration,
    ) -> Self {
        Self {
            classifier,
            session,
            gate,
            state: Arc::new(Mutex::new(WorkflowState {
                phase: Phase::Idle,
                result: None,
                in_flight: false,
                generation: 0,
                prompt: None,
            })),
            events,
            prompt_delay,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// The live result, if any.
    pub fn result(&self) -> Option<AnalysisResult> {
        self.state.lock().result.clone()
    }

    /// Submits a passage for classification.
    ///
    /// Local validation runs first and the usage gate second, both before any
    /// network call. The single-flight flag is checked and set in the same
    /// locked step, so a second concurrent call is rejected without reaching
    /// the classifier.
    pub async fn submit(&self, text: &str) -> PortResult<SubmitOutcome> {
        validate_article_text(text)?;

        let authenticated = self.session.lock().is_authenticated();
        let generation = {
            let mut state = self.state.lock();
            if state.in_flight {
                return Err(PortError::Validation(
                    "An analysis is already in progress.".to_string(),
                ));
            }
            if self.gate.should_block(authenticated) {
                state.phase = Phase::Blocked;
                let _ = self.events.send(UiEvent::SignupRequired);
                return Ok(SubmitOutcome::RequiresSignup);
            }
            // A new submission supersedes whatever result was live.
            cancel_prompt(&mut state);
            state.result = None;
            state.in_flight = true;
            state.phase = Phase::Submitting;
            state.generation
        };

        let _ = self.events.send(UiEvent::AnalysisStarted);
        let reply = self.classifier.classify(text).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            // `clear` ran while the request was outstanding; its eventual
            // result no longer belongs to anyone.
            info!("discarding stale classification result");
            return Ok(SubmitOutcome::Discarded);
        }
        state.in_flight = false;

        match reply {
            Ok(prediction) => {
                let result = AnalysisResult::from_prediction(prediction);
                state.result = Some(result.clone());
                state.phase = Phase::AwaitingFeedback;
                drop(state);

                // Re-read rather than reuse the pre-submit answer: a login
                // that completed mid-flight must not cost a guest credit.
                if !self.session.lock().is_authenticated() {
                    self.gate.record_attempt();
                }
                self.arm_prompt(result.prediction_id.clone(), generation);
                let _ = self.events.send(UiEvent::AnalysisCompleted {
                    analysis_id: result.prediction_id.clone(),
                    label: result.label,
                    confidence: result.confidence,
                });
                Ok(SubmitOutcome::Completed(result))
            }
            Err(e) => {
                state.phase = Phase::Failed;
                drop(state);
                let _ = self.events.send(UiEvent::AnalysisFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Resets to `Idle` from any state: the live result is dropped, a pending
    /// prompt timer is cancelled, and an in-flight request's eventual
    /// completion is marked stale.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        cancel_prompt(&mut state);
        state.generation = state.generation.wrapping_add(1);
        state.in_flight = false;
        state.result = None;
        state.phase = Phase::Idle;
    }

    /// Records that the user declined (or never answered) the feedback
    /// prompt. The result stays live until `clear`.
    pub fn dismiss_prompt(&self) {
        let mut state = self.state.lock();
        if matches!(state.phase, Phase::AwaitingFeedback | Phase::Prompted) {
            cancel_prompt(&mut state);
            state.phase = Phase::Abandoned;
        }
    }

    /// Arms the one-shot deferred feedback prompt for the result that just
    /// landed. The timer transitions the workflow to `Prompted` unless the
    /// workflow has already left the awaiting state.
    fn arm_prompt(&self, analysis_id: String, generation: u64) {
        let token = CancellationToken::new();
        let task = {
            let state = self.state.clone();
            let events = self.events.clone();
            let token = token.clone();
            let delay = self.prompt_delay;
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        let mut state = state.lock();
                        // A firing that lost the race to `clear` or a new
                        // submission is dropped as a no-op.
                        if state.generation == generation
                            && state.phase == Phase::AwaitingFeedback
                        {
                            state.phase = Phase::Prompted;
                            let _ = events.send(UiEvent::FeedbackPromptDue { analysis_id });
                        }
                    }
                }
            })
        };

        let mut state = self.state.lock();
        if state.generation != generation || state.phase != Phase::AwaitingFeedback {
            // Cleared between completion and arming; never let the timer run.
            token.cancel();
            task.abort();
            return;
        }
        state.prompt = Some(PromptTimer { token, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GUEST_ANALYSIS_LIMIT;
    use async_trait::async_trait;
    use newscheck_core::domain::{Prediction, Session, UserRecord, Verdict};
    use newscheck_core::ports::StateStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn article() -> String {
        words(50)
    }

    #[derive(Default)]
    struct MemoryStore {
        count: Mutex<u32>,
    }

    impl StateStore for MemoryStore {
        fn load_session(&self) -> Option<(String, UserRecord)> {
            None
        }
        fn save_session(&self, _token: &str, _user: &UserRecord) -> PortResult<()> {
            Ok(())
        }
        fn save_token(&self, _token: &str) -> PortResult<()> {
            Ok(())
        }
        fn clear_session(&self) -> PortResult<()> {
            Ok(())
        }
        fn load_usage_count(&self) -> u32 {
            *self.count.lock()
        }
        fn save_usage_count(&self, count: u32) -> PortResult<()> {
            *self.count.lock() = count;
            Ok(())
        }
    }

    /// Classifier fake: counts calls, optionally dawdles or fails, and hands
    /// out sequential prediction ids.
    #[derive(Default)]
    struct FakeClassifier {
        delay: Option<Duration>,
        fail: bool,
        omit_id: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClassificationService for FakeClassifier {
        async fn classify(&self, _text: &str) -> PortResult<Prediction> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(PortError::Network("classifier is down".to_string()));
            }
            Ok(Prediction {
                prediction_id: (!self.omit_id).then(|| format!("p-{call}")),
                label: Verdict::Fake,
                confidence: 0.9,
            })
        }
    }

    struct Harness {
        classifier: Arc<FakeClassifier>,
        session: SharedSession,
        gate: Arc<UsageGate>,
        workflow: Arc<AnalysisWorkflow>,
        events: UnboundedReceiver<UiEvent>,
    }

    fn harness(classifier: FakeClassifier) -> Harness {
        let classifier = Arc::new(classifier);
        let session: SharedSession = Arc::new(Mutex::new(Session::empty()));
        let gate = Arc::new(UsageGate::new(Arc::new(MemoryStore::default())));
        let (tx, rx) = mpsc::unbounded_channel();
        let workflow = Arc::new(AnalysisWorkflow::new(
            classifier.clone(),
            session.clone(),
            gate.clone(),
            tx,
            Duration::from_millis(40),
        ));
        Harness {
            classifier,
            session,
            gate,
            workflow,
            events: rx,
        }
    }

    fn authenticate(session: &SharedSession) {
        *session.lock() = Session::authenticated(
            "tok".to_string(),
            UserRecord {
                id: "u-1".to_string(),
                email: "ada@example.com".to_string(),
                name: "Ada".to_string(),
                role: Default::default(),
            },
        );
    }

    fn drain(events: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn short_text_fails_before_any_network_call() {
        let h = harness(FakeClassifier::default());
        let err = h.workflow.submit(&words(49)).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.workflow.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn fifty_words_is_enough() {
        let h = harness(FakeClassifier::default());
        let outcome = h.workflow.submit(&article()).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn success_stores_the_result_and_counts_the_guest_attempt() {
        let mut h = harness(FakeClassifier::default());
        let outcome = h.workflow.submit(&article()).await.unwrap();

        let result = match outcome {
            SubmitOutcome::Completed(result) => result,
            other => panic!("expected Completed, got {other:?}"),
        };
        assert_eq!(result.prediction_id, "p-1");
        assert_eq!(h.workflow.phase(), Phase::AwaitingFeedback);
        assert_eq!(h.gate.count(), 1);

        let events = drain(&mut h.events);
        assert!(matches!(events[0], UiEvent::AnalysisStarted));
        assert!(matches!(events[1], UiEvent::AnalysisCompleted { .. }));
    }

    #[tokio::test]
    async fn authenticated_attempts_do_not_consume_guest_credits() {
        let h = harness(FakeClassifier::default());
        authenticate(&h.session);
        h.workflow.submit(&article()).await.unwrap();
        assert_eq!(h.gate.count(), 0);
    }

    #[tokio::test]
    async fn missing_prediction_id_is_synthesized() {
        let h = harness(FakeClassifier {
            omit_id: true,
            ..Default::default()
        });
        let outcome = h.workflow.submit(&article()).await.unwrap();
        match outcome {
            SubmitOutcome::Completed(result) => {
                assert!(!result.prediction_id.is_empty());
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fourth_guest_attempt_is_routed_to_signup() {
        let mut h = harness(FakeClassifier::default());
        for _ in 0..GUEST_ANALYSIS_LIMIT {
            let outcome = h.workflow.submit(&article()).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Completed(_)));
        }

        let outcome = h.workflow.submit(&article()).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::RequiresSignup));
        assert_eq!(h.workflow.phase(), Phase::Blocked);
        // The gate refused before the classifier was consulted again.
        assert_eq!(
            h.classifier.calls.load(Ordering::SeqCst),
            GUEST_ANALYSIS_LIMIT as usize
        );
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, UiEvent::SignupRequired)));
    }

    #[tokio::test]
    async fn failure_records_no_attempt_and_stays_resubmittable() {
        let h = harness(FakeClassifier {
            fail: true,
            ..Default::default()
        });
        let err = h.workflow.submit(&article()).await.unwrap_err();
        assert!(matches!(err, PortError::Network(_)));
        assert_eq!(h.gate.count(), 0);
        assert_eq!(h.workflow.phase(), Phase::Failed);

        // A retry reaches the classifier again.
        let _ = h.workflow.submit(&article()).await;
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_submit_while_outstanding_is_rejected_without_a_call() {
        let h = harness(FakeClassifier {
            delay: Some(Duration::from_millis(150)),
            ..Default::default()
        });
        let workflow = h.workflow.clone();
        let first = tokio::spawn(async move {
            let text = article();
            workflow.submit(&text).await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let err = h.workflow.submit(&article()).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        first.await.unwrap().unwrap();
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prompt_fires_after_the_delay() {
        let mut h = harness(FakeClassifier::default());
        h.workflow.submit(&article()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(h.workflow.phase(), Phase::Prompted);
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, UiEvent::FeedbackPromptDue { .. })));
    }

    #[tokio::test]
    async fn clearing_before_the_delay_prevents_the_prompt() {
        let mut h = harness(FakeClassifier::default());
        h.workflow.submit(&article()).await.unwrap();
        h.workflow.clear();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(h.workflow.phase(), Phase::Idle);
        assert!(!drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, UiEvent::FeedbackPromptDue { .. })));
    }

    #[tokio::test]
    async fn a_new_submission_replaces_the_pending_prompt() {
        let mut h = harness(FakeClassifier::default());
        h.workflow.submit(&article()).await.unwrap();
        h.workflow.submit(&article()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        let prompts: Vec<_> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::FeedbackPromptDue { analysis_id } => Some(analysis_id),
                _ => None,
            })
            .collect();
        // Only the second result's prompt survives.
        assert_eq!(prompts, vec!["p-2".to_string()]);
    }

    #[tokio::test]
    async fn stale_completion_after_clear_is_discarded() {
        let h = harness(FakeClassifier {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let workflow = h.workflow.clone();
        let pending = tokio::spawn(async move {
            let text = article();
            workflow.submit(&text).await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.workflow.clear();

        let outcome = pending.await.unwrap().unwrap();
        assert!(matches!(outcome, SubmitOutcome::Discarded));
        assert!(h.workflow.result().is_none());
        assert_eq!(h.workflow.phase(), Phase::Idle);
        assert_eq!(h.gate.count(), 0);
    }

    #[tokio::test]
    async fn dismissing_the_prompt_abandons_feedback_but_keeps_the_result() {
        let h = harness(FakeClassifier::default());
        h.workflow.submit(&article()).await.unwrap();
        h.workflow.dismiss_prompt();

        assert_eq!(h.workflow.phase(), Phase::Abandoned);
        assert!(h.workflow.result().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        // The cancelled timer never resurrects the prompt.
        assert_eq!(h.workflow.phase(), Phase::Abandoned);
    }
}
