//! services/app/src/feedback.rs
//!
//! The feedback collector: captures a 1-5 quality rating for a completed
//! analysis. Both the prompt and the submission are gated on the shared
//! session — a rating that could never be submitted is not collected.

use std::sync::Arc;

use newscheck_core::ports::{AuthCause, FeedbackService, PortResult};
use newscheck_core::validate::validate_feedback;
use tracing::info;

use crate::session::SharedSession;

/// What presenting the rating request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The user may rate this analysis.
    RatingRequested { analysis_id: String },
    /// No session at prompt time: route to sign-in instead of collecting a
    /// rating that cannot be submitted.
    SigninRequired,
}

pub struct FeedbackCollector {
    feedback: Arc<dyn FeedbackService>,
    session: SharedSession,
}

impl FeedbackCollector {
    pub fn new(feedback: Arc<dyn FeedbackService>, session: SharedSession) -> Self {
        Self { feedback, session }
    }

    /// Presents the rating request for an analysis, short-circuiting to a
    /// sign-in requirement when the caller is unauthenticated.
    pub fn prompt_for_rating(&self, analysis_id: &str) -> PromptOutcome {
        if !self.session.lock().is_authenticated() {
            return PromptOutcome::SigninRequired;
        }
        PromptOutcome::RatingRequested {
            analysis_id: analysis_id.to_string(),
        }
    }

    /// Submits a rating. Local validation first, then the token check —
    /// neither failure reaches the network. One accepted submission per
    /// analysis id is the caller's responsibility; the collector does not
    /// deduplicate.
    pub async fn submit(&self, analysis_id: &str, rating: u8) -> PortResult<()> {
        validate_feedback(analysis_id, rating)?;

        let token = match self.session.lock().token() {
            Some(token) => token.to_string(),
            None => return Err(AuthCause::MissingToken.into()),
        };

        self.feedback
            .submit_rating(&token, analysis_id, rating)
            .await?;
        info!(analysis_id, rating, "feedback submitted");
        Ok(())
    }
}
