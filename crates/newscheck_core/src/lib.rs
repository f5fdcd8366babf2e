pub mod domain;
pub mod ports;
pub mod validate;

pub use domain::{AnalysisResult, AuthGrant, Prediction, Role, Session, UserRecord, Verdict};
pub use ports::{
    AuthCause, ClassificationService, FeedbackService, IdentityService, PortError, PortResult,
    StateStore,
};
