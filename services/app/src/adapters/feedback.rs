//! services/app/src/adapters/feedback.rs
//!
//! This module contains the adapter for the remote feedback endpoint.
//! It implements the `FeedbackService` port from the `core` crate.

use async_trait::async_trait;
use newscheck_core::ports::{AuthCause, FeedbackService, PortError, PortResult};
use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// Translates a non-success feedback response into the error taxonomy:
/// 401 means the credential was rejected, 422 means the payload was, a
/// structured `detail` is surfaced verbatim, and anything else is a generic
/// submission failure.
fn map_feedback_failure(status: StatusCode, body: &str) -> PortError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.trim().is_empty());
    match status {
        StatusCode::UNAUTHORIZED => PortError::Auth(AuthCause::SessionExpired),
        StatusCode::UNPROCESSABLE_ENTITY => {
            PortError::Validation("Invalid data sent. Please try again.".to_string())
        }
        _ => match detail {
            Some(d) => PortError::Server(d),
            None => PortError::Network(
                "Failed to submit feedback. Please try again.".to_string(),
            ),
        },
    }
}

/// An adapter that implements `FeedbackService` against `POST /feedback`.
#[derive(Clone)]
pub struct HttpFeedbackAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeedbackAdapter {
    /// Creates a new `HttpFeedbackAdapter`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl FeedbackService for HttpFeedbackAdapter {
    async fn submit_rating(&self, token: &str, analysis_id: &str, rating: u8) -> PortResult<()> {
        let response = self
            .client
            .post(format!("{}/feedback", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "analysis_id": analysis_id,
                "rating": rating,
            }))
            .send()
            .await
            .map_err(|e| PortError::Network(format!("feedback service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_feedback_failure(status, &body));
        }
        Ok(())
    }
}
