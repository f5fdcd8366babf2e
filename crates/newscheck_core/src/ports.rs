//! crates/newscheck_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the remote
//! HTTP services or the on-disk state file.

use async_trait::async_trait;

use crate::domain::{AuthGrant, Prediction, UserRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The reason an operation was refused for authentication reasons.
///
/// A closed set so callers can route each case (retry the form, show the
/// lockout notice, send the user to the login screen) without probing
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthCause {
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("This account is locked. Contact support to regain access.")]
    AccountLocked,
    #[error("You must be logged in to do that.")]
    MissingToken,
    #[error("Your session has expired. Please log in again.")]
    SessionExpired,
}

/// The closed error taxonomy for all port operations.
///
/// Remote failures are translated to one of these kinds at the adapter
/// boundary; no raw transport error crosses a port. `Server` carries a
/// structured failure detail from the remote service verbatim, `Network` is
/// the unclassified fallback.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Malformed local input. Never reaches the network.
    #[error("{0}")]
    Validation(String),
    /// Missing, invalid, or expired credential.
    #[error(transparent)]
    Auth(#[from] AuthCause),
    /// The anonymous usage gate refused the attempt. Resolved by routing the
    /// user to registration, not by retrying.
    #[error("Guest analysis limit reached. Please sign up to continue.")]
    QuotaBlocked,
    /// Transport or remote failure with no structured detail.
    #[error("Network error: {0}")]
    Network(String),
    /// A structured failure detail returned by the remote service.
    #[error("{0}")]
    Server(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Exchanges credentials for a token and the matching user record.
    async fn login(&self, email: &str, password: &str) -> PortResult<AuthGrant>;

    /// Registers a new identity. Same grant shape as `login`.
    async fn signup(&self, email: &str, password: &str, name: &str) -> PortResult<AuthGrant>;

    /// Exchanges the ambient credential for a renewed access token.
    async fn refresh(&self) -> PortResult<String>;

    /// Asks the service to mail a reset link. Always reported as success by
    /// the server to avoid account enumeration.
    async fn request_password_reset(&self, email: &str) -> PortResult<()>;

    /// Sets a new password using an emailed reset token.
    async fn reset_password(&self, token: &str, new_password: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Classifies a text passage as credible or not.
    async fn classify(&self, text: &str) -> PortResult<Prediction>;
}

#[async_trait]
pub trait FeedbackService: Send + Sync {
    /// Submits a 1-5 quality rating for an earlier analysis, authenticated
    /// with the given bearer token.
    async fn submit_rating(&self, token: &str, analysis_id: &str, rating: u8) -> PortResult<()>;
}

/// Durable key/value persistence for the client's session and usage state.
///
/// Synchronous by design: the store is local (no network), and callers such
/// as `logout` must be able to commit without suspending or failing.
pub trait StateStore: Send + Sync {
    /// Returns the persisted credential pair, or `None` when it is absent,
    /// structurally invalid, or one-sided (token without user or vice versa).
    fn load_session(&self) -> Option<(String, UserRecord)>;

    /// Persists the token and user record together.
    fn save_session(&self, token: &str, user: &UserRecord) -> PortResult<()>;

    /// Replaces only the token, keeping the stored user record.
    fn save_token(&self, token: &str) -> PortResult<()>;

    /// Removes the persisted credential pair. Leaves the usage counter alone.
    fn clear_session(&self) -> PortResult<()>;

    /// Returns the persisted anonymous-usage count (0 when absent or corrupt).
    fn load_usage_count(&self) -> u32;

    /// Persists the anonymous-usage count.
    fn save_usage_count(&self, count: u32) -> PortResult<()>;
}
