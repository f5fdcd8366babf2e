//! services/app/src/session.rs
//!
//! The session manager: owns the `Session` entity, performs
//! login/signup/logout/refresh against the remote identity service, and keeps
//! the in-memory session and the state store synchronized.

use std::sync::Arc;

use newscheck_core::domain::{AuthGrant, Session, UserRecord};
use newscheck_core::ports::{AuthCause, IdentityService, PortResult, StateStore};
use newscheck_core::validate::validate_password;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::gate::UsageGate;

/// The one session object for the process, shared by handle with the few
/// components that read it. Only the session manager writes to it.
pub type SharedSession = Arc<Mutex<Session>>;

pub struct SessionManager {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn StateStore>,
    session: SharedSession,
    gate: Arc<UsageGate>,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn StateStore>,
        session: SharedSession,
        gate: Arc<UsageGate>,
    ) -> Self {
        Self {
            identity,
            store,
            session,
            gate,
        }
    }

    /// Hydrates the session from the store. No network I/O; called once at
    /// startup. Invalid or one-sided stored data was already discarded by the
    /// store, so this either yields a full session or an empty one.
    pub fn restore(&self) {
        if let Some((token, user)) = self.store.load_session() {
            info!(user = %user.email, "restored persisted session");
            *self.session.lock() = Session::authenticated(token, user);
        }
    }

    /// Derived from the session, never cached separately.
    pub fn is_authenticated(&self) -> bool {
        self.session.lock().is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.session.lock().user().cloned()
    }

    /// Exchanges credentials for a session. On success the token and user
    /// record are committed together and the guest allowance is reset; on
    /// failure the prior session is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> PortResult<UserRecord> {
        let grant = self.identity.login(email, password).await?;
        Ok(self.commit_grant(grant))
    }

    /// Registers a new identity. The password policy is enforced locally
    /// before any network call; the rest matches `login`.
    pub async fn signup(&self, email: &str, password: &str, name: &str) -> PortResult<UserRecord> {
        validate_password(password)?;
        let grant = self.identity.signup(email, password, name).await?;
        Ok(self.commit_grant(grant))
    }

    /// Clears the session in memory and in the store. Cannot fail: store
    /// trouble is logged and swallowed. The usage counter is deliberately
    /// left alone, so a logout/login cycle cannot mint a fresh allowance.
    pub fn logout(&self) {
        self.session.lock().clear();
        if let Err(e) = self.store.clear_session() {
            warn!("failed to clear persisted session: {e}");
        }
        info!("logged out");
    }

    /// Exchanges the ambient credential for a renewed token. Any failure
    /// invalidates the session entirely rather than leaving a stale token.
    pub async fn refresh(&self) -> PortResult<()> {
        if !self.is_authenticated() {
            return Err(AuthCause::MissingToken.into());
        }
        match self.identity.refresh().await {
            Ok(token) => {
                self.session.lock().renew_token(token.clone());
                if let Err(e) = self.store.save_token(&token) {
                    warn!("failed to persist renewed token: {e}");
                }
                Ok(())
            }
            Err(e) => {
                warn!("token refresh failed, dropping session: {e}");
                self.logout();
                Err(e)
            }
        }
    }

    /// Asks the identity service to mail a reset link.
    pub async fn request_password_reset(&self, email: &str) -> PortResult<()> {
        self.identity.request_password_reset(email).await
    }

    /// Sets a new password from an emailed reset token. The policy check is
    /// local; the current session is not touched either way.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> PortResult<()> {
        validate_password(new_password)?;
        self.identity.reset_password(token, new_password).await
    }

    /// Commits a grant: session and persisted copy updated under one lock so
    /// no reader can observe a half-authenticated state, then the guest
    /// allowance is reset.
    fn commit_grant(&self, grant: AuthGrant) -> UserRecord {
        let user = grant.user.clone();
        {
            let mut session = self.session.lock();
            *session = Session::authenticated(grant.access_token.clone(), grant.user);
            if let Err(e) = self.store.save_session(&grant.access_token, &user) {
                warn!("failed to persist session: {e}");
            }
        }
        self.gate.reset();
        info!(user = %user.email, "session established");
        user
    }
}
