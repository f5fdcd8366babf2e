//! services/app/src/adapters/identity.rs
//!
//! This module contains the adapter for the remote identity service.
//! It implements the `IdentityService` port from the `core` crate.

use async_trait::async_trait;
use newscheck_core::domain::{AuthGrant, Role, UserRecord};
use newscheck_core::ports::{AuthCause, IdentityService, PortError, PortResult};
use reqwest::StatusCode;
use serde::Deserialize;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct UserWire {
    id: String,
    email: String,
    name: String,
    #[serde(default)]
    role: Role,
}

impl UserWire {
    fn to_domain(self) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email,
            name: self.name,
            role: self.role,
        }
    }
}

/// Response shape shared by `/auth/login` and `/auth/register`.
/// The `token_type` field also arrives but the client has no use for it.
#[derive(Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    user: Option<UserWire>,
}

/// Structured failure body: FastAPI-style `detail`, with `message` as a
/// fallback some deployments use instead.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    message: Option<String>,
}

/// Pulls the human-readable detail out of an error response body, if any.
fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail.or(b.message))
        .filter(|d| !d.trim().is_empty())
}

/// Translates a non-success auth response into the error taxonomy.
///
/// Locked accounts are reported either as HTTP 423 or as a detail message
/// mentioning the lock; credential mismatches come back as 401/403/404
/// depending on the deployment.
fn map_auth_failure(status: StatusCode, body: &str) -> PortError {
    let detail = error_detail(body);
    if status == StatusCode::LOCKED
        || detail
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains("locked"))
    {
        return PortError::Auth(AuthCause::AccountLocked);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            PortError::Auth(AuthCause::InvalidCredentials)
        }
        _ => match detail {
            Some(d) => PortError::Server(d),
            None => PortError::Network(format!("identity service returned {status}")),
        },
    }
}

fn transport_error(err: reqwest::Error) -> PortError {
    PortError::Network(format!("identity service unreachable: {err}"))
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `IdentityService` against the remote HTTP API.
#[derive(Clone)]
pub struct HttpIdentityAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityAdapter {
    /// Creates a new `HttpIdentityAdapter`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Parses a grant out of a successful login/register body. The user
    /// record must accompany the token; a token alone cannot populate a
    /// session.
    fn parse_grant(body: AuthResponse) -> PortResult<AuthGrant> {
        match (body.access_token, body.user) {
            (Some(token), Some(user)) if !token.is_empty() => Ok(AuthGrant {
                access_token: token,
                user: user.to_domain(),
            }),
            _ => Err(PortError::Network(
                "identity service reply was missing the token or user record".to_string(),
            )),
        }
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for HttpIdentityAdapter {
    async fn login(&self, email: &str, password: &str) -> PortResult<AuthGrant> {
        // The login endpoint speaks the OAuth2 password form, not JSON.
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .form(&[("username", email), ("password", password)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_auth_failure(status, &body));
        }

        let body: AuthResponse = response.json().await.map_err(transport_error)?;
        Self::parse_grant(body)
    }

    async fn signup(&self, email: &str, password: &str, name: &str) -> PortResult<AuthGrant> {
        let response = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "name": name,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Registration failures ("Email is already registered.") arrive
            // as structured detail, not as credential errors.
            let detail = error_detail(&body);
            return Err(match detail {
                Some(d) if d.to_lowercase().contains("locked") => {
                    PortError::Auth(AuthCause::AccountLocked)
                }
                Some(d) => PortError::Server(d),
                None => PortError::Network(format!("identity service returned {status}")),
            });
        }

        let body: AuthResponse = response.json().await.map_err(transport_error)?;
        Self::parse_grant(body)
    }

    async fn refresh(&self) -> PortResult<String> {
        // No body: the refresh credential rides along as an ambient cookie
        // held by the client's cookie store.
        let response = self
            .client
            .post(format!("{}/auth/refresh", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Auth(AuthCause::SessionExpired));
        }

        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: Option<String>,
        }
        let body: RefreshResponse = response.json().await.map_err(transport_error)?;
        match body.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(PortError::Auth(AuthCause::SessionExpired)),
        }
    }

    async fn request_password_reset(&self, email: &str) -> PortResult<()> {
        let response = self
            .client
            .post(format!("{}/auth/request-password-reset", self.base_url))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match error_detail(&body) {
                Some(d) => PortError::Server(d),
                None => PortError::Network(format!("identity service returned {status}")),
            });
        }
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> PortResult<()> {
        let response = self
            .client
            .post(format!("{}/auth/reset-password", self.base_url))
            .json(&serde_json::json!({
                "token": token,
                "new_password": new_password,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match error_detail(&body) {
                Some(d) => PortError::Server(d),
                None => PortError::Network(format!("identity service returned {status}")),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_account_is_distinguishable() {
        let err = map_auth_failure(StatusCode::LOCKED, "");
        assert!(matches!(err, PortError::Auth(AuthCause::AccountLocked)));

        let err = map_auth_failure(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Account locked after too many attempts"}"#,
        );
        assert!(matches!(err, PortError::Auth(AuthCause::AccountLocked)));
    }

    #[test]
    fn credential_mismatch_statuses_map_to_invalid_credentials() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ] {
            let err = map_auth_failure(status, r#"{"detail": "Invalid password"}"#);
            assert!(matches!(err, PortError::Auth(AuthCause::InvalidCredentials)));
        }
    }

    #[test]
    fn structured_detail_is_surfaced_verbatim() {
        let err = map_auth_failure(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Email is already registered."}"#,
        );
        match err {
            PortError::Server(detail) => assert_eq!(detail, "Email is already registered."),
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn unstructured_failure_falls_back_to_network() {
        let err = map_auth_failure(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, PortError::Network(_)));
    }

    #[test]
    fn grant_requires_token_and_user_together() {
        let body: AuthResponse = serde_json::from_str(
            r#"{"access_token": "tok", "token_type": "bearer"}"#,
        )
        .unwrap();
        assert!(HttpIdentityAdapter::parse_grant(body).is_err());

        let body: AuthResponse = serde_json::from_str(
            r#"{
                "access_token": "tok",
                "token_type": "bearer",
                "user": {"id": "1", "email": "a@b.c", "name": "A"}
            }"#,
        )
        .unwrap();
        let grant = HttpIdentityAdapter::parse_grant(body).unwrap();
        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.user.role, Role::User);
    }
}
