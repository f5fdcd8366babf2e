pub mod adapters;
pub mod config;
pub mod error;
pub mod feedback;
pub mod gate;
pub mod protocol;
pub mod session;
pub mod workflow;

// Re-export the pieces a driver needs to wire the subsystem together.
pub use feedback::{FeedbackCollector, PromptOutcome};
pub use gate::{UsageGate, GUEST_ANALYSIS_LIMIT};
pub use protocol::UiEvent;
pub use session::{SessionManager, SharedSession};
pub use workflow::{AnalysisWorkflow, Phase, SubmitOutcome};
