//! crates/newscheck_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or persistence format.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role a registered user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A registered user as returned by the identity service.
///
/// Immutable for the lifetime of a session: replaced wholesale on
/// login/signup/refresh, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

/// The authenticated identity currently held by the client, or its absence.
///
/// `token` and `user` are always set and cleared together; their joint
/// presence is what defines "authenticated". No constructor accepts one
/// without the other.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    user: Option<UserRecord>,
}

impl Session {
    /// An empty, unauthenticated session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A session holding a credential and the user it belongs to.
    pub fn authenticated(token: String, user: UserRecord) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
        }
    }

    /// True iff both the token and the user record are present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// Replaces the token while keeping the user record (token renewal).
    /// Has no effect on an unauthenticated session.
    pub fn renew_token(&mut self, token: String) {
        if self.user.is_some() {
            self.token = Some(token);
        }
    }

    /// Clears both the token and the user record.
    pub fn clear(&mut self) {
        self.token = None;
        self.user = None;
    }
}

/// The credential grant returned by a successful login or signup.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub access_token: String,
    pub user: UserRecord,
}

/// The credibility label assigned by the classification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fake,
    Real,
}

/// A raw classification reply from the remote service. The service may omit
/// the prediction id; [`AnalysisResult::from_prediction`] fills the gap.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub prediction_id: Option<String>,
    pub label: Verdict,
    pub confidence: f64,
}

/// A completed analysis, ready to be correlated with user feedback.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub prediction_id: String,
    pub label: Verdict,
    pub confidence: f64,
}

impl AnalysisResult {
    /// Promotes a service reply into a result, synthesizing a prediction id
    /// client-side only when the service omitted one.
    pub fn from_prediction(prediction: Prediction) -> Self {
        Self {
            prediction_id: prediction
                .prediction_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            label: prediction.label,
            confidence: prediction.confidence,
        }
    }
}
