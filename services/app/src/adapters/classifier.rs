//! services/app/src/adapters/classifier.rs
//!
//! This module contains the adapter for the remote classification service.
//! It implements the `ClassificationService` port from the `core` crate.
//! The model behind the endpoint is opaque to the client; only the verdict
//! and confidence come back.

use async_trait::async_trait;
use newscheck_core::domain::{Prediction, Verdict};
use newscheck_core::ports::{ClassificationService, PortError, PortResult};
use serde::Deserialize;

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(rename = "predictionId")]
    prediction_id: Option<String>,
    prediction: Verdict,
    confidence: f64,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// An adapter that implements `ClassificationService` against `POST /predict`.
#[derive(Clone)]
pub struct HttpClassifierAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClassifierAdapter {
    /// Creates a new `HttpClassifierAdapter`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl ClassificationService for HttpClassifierAdapter {
    async fn classify(&self, text: &str) -> PortResult<Prediction> {
        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PortError::Network(format!("classification service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail);
            return Err(match detail {
                Some(d) => PortError::Server(d),
                None => PortError::Network(format!(
                    "classification service returned {status}"
                )),
            });
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| PortError::Network(format!("malformed prediction reply: {e}")))?;

        Ok(Prediction {
            prediction_id: body.prediction_id,
            label: body.prediction,
            confidence: body.confidence,
        })
    }
}
