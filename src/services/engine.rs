use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::importance::ImportanceTensor;

/// Classifier output before label lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPrediction {
    pub class_index: usize,
    pub confidence: f64,
}

/// Prediction plus per-pixel attribution for one image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub prediction: RawPrediction,
    pub importance: ImportanceTensor,
}

/// The classifier/explainer capability. Handed to the worker at construction.
#[async_trait]
pub trait ExplainabilityEngine: Send + Sync {
    async fn compute(&self, image: &[u8]) -> Result<Explanation, EngineError>;
}

/// HTTP client for a remote explainability inference endpoint.
pub struct RemoteEngine {
    http: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl RemoteEngine {
    pub fn new(endpoint: &str, api_token: Option<&str>) -> Result<Self, EngineError> {
        // Attribution runs take minutes, not seconds.
        let http = Client::builder()
            .timeout(Duration::from_secs(900))
            .build()
            .map_err(EngineError::Http)?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_token: api_token.map(str::to_string),
        })
    }
}

#[async_trait]
impl ExplainabilityEngine for RemoteEngine {
    async fn compute(&self, image: &[u8]) -> Result<Explanation, EngineError> {
        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image),
        });

        let mut request = self.http.post(&self.endpoint).json(&request_body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(EngineError::Http)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status(status.as_u16(), body));
        }

        let explanation: Explanation = response.json().await.map_err(EngineError::Http)?;
        validate_prediction(&explanation.prediction)?;
        Ok(explanation)
    }
}

/// Confidence must be a probability.
pub fn validate_prediction(prediction: &RawPrediction) -> Result<(), EngineError> {
    if !prediction.confidence.is_finite() || !(0.0..=1.0).contains(&prediction.confidence) {
        return Err(EngineError::InvalidResponse(format!(
            "confidence {} outside [0, 1]",
            prediction.confidence
        )));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine returned status {0}: {1}")]
    Status(u16, String),

    #[error("Engine response invalid: {0}")]
    InvalidResponse(String),

    #[error("Engine failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bounds() {
        let ok = RawPrediction { class_index: 1, confidence: 0.93 };
        assert!(validate_prediction(&ok).is_ok());

        let too_high = RawPrediction { class_index: 1, confidence: 1.2 };
        assert!(validate_prediction(&too_high).is_err());

        let nan = RawPrediction { class_index: 0, confidence: f64::NAN };
        assert!(validate_prediction(&nan).is_err());
    }

    #[test]
    fn test_explanation_wire_format() {
        let explanation: Explanation = serde_json::from_str(
            r#"{
                "prediction": {"class_index": 1, "confidence": 0.87},
                "importance": {"shape": [2, 2], "values": [0.1, 0.2, 0.3, 0.4]}
            }"#,
        )
        .unwrap();
        assert_eq!(explanation.prediction.class_index, 1);
        assert_eq!(explanation.importance.shape, vec![2, 2]);
    }
}
