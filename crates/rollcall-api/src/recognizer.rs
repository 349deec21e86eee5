//! Thin client for the external face-recognition API
//!
//! The ML service is a separate deployment with its own lifecycle; this
//! backend only forwards capture payloads and relays candidate matches.

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct FaceGatewayClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Payload forwarded to the recognition service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionRequest {
    /// Base64-encoded capture frame
    pub image: String,
    /// Optional section hint to narrow the candidate set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionMatch {
    pub student_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionOutcome {
    pub matches: Vec<RecognitionMatch>,
}

impl FaceGatewayClient {
    /// Construct the client when the face API pair is configured
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.face_api.as_ref().map(|face| Self {
            client: reqwest::Client::new(),
            base_url: face.base_url.clone(),
            api_key: face.api_key.clone(),
        })
    }

    pub async fn identify(&self, request: &RecognitionRequest) -> Result<RecognitionOutcome, AppError> {
        let request_url = format!("{}/v1/identify", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&request_url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| {
                AppError::external(format!(
                    "Face recognition request failed: {}",
                    sanitize(&error)
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external(format!(
                "Face recognition request failed with HTTP {}: {}",
                status,
                compact_body(&body)
            )));
        }

        let payload = response
            .json::<RecognitionOutcome>()
            .await
            .map_err(|error| {
                AppError::external(format!(
                    "Face recognition response parse failed: {}",
                    sanitize(&error)
                ))
            })?;

        Ok(payload)
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

fn compact_body(body: &str) -> String {
    body.trim().chars().take(180).collect()
}
