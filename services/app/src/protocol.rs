//! services/app/src/protocol.rs
//!
//! Defines the event protocol between the workflow engine and the surrounding
//! user interface for the credibility-check application.

use newscheck_core::domain::Verdict;
use serde::Serialize;

//=========================================================================================
// Events Sent FROM the Workflow Engine TO the UI
//=========================================================================================
// NOTE: These carry the state changes a UI needs to render; they never carry
// credentials. Whatever drives the engine (terminal, desktop shell, test
// harness) subscribes to this stream.
//=========================================================================================

/// Represents the structured events the workflow engine can emit to the UI.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// An analysis request has been sent to the classification service.
    /// The UI can update to an "analyzing..." state.
    AnalysisStarted,

    /// The classification service returned a verdict for the current passage.
    AnalysisCompleted {
        analysis_id: String,
        label: Verdict,
        confidence: f64,
    },

    /// The analysis attempt failed; the workflow stays re-submittable.
    AnalysisFailed { message: String },

    /// The anonymous usage gate refused the attempt. The UI should route the
    /// user to the signup flow rather than show an error.
    SignupRequired,

    /// The deferred post-analysis prompt fired: ask the user for a 1-5 rating
    /// correlated to this analysis.
    FeedbackPromptDue { analysis_id: String },
}
