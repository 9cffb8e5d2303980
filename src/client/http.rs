//! HTTP implementation of the model client.
//!
//! Posts `{model, prompt, stream: false, temperature}` to the configured
//! generation endpoint and expects `{response: "..."}` back — the
//! Ollama-compatible generate contract. Failures are normalized into the
//! [`ClientError`] taxonomy; no retries, no local side effects.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use super::{ClientError, Generate, ModelRequest};
use crate::config::Settings;

/// Model client backed by a reqwest HTTP client.
pub struct HttpModelClient {
    api_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpModelClient {
    /// Builds a client for `model` from the loaded settings.
    ///
    /// The request timeout honors a per-model override when one is
    /// configured, otherwise the global `timeout_secs`.
    pub fn from_settings(settings: &Settings, model: &str) -> Self {
        Self {
            api_url: settings.api_url.clone(),
            timeout: settings.timeout_for(model),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Generate for HttpModelClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ClientError> {
        let prompt = request.render();
        debug!(
            model = %request.model,
            prompt_chars = prompt.len(),
            "sending generation request"
        );

        let payload = json!({
            "model": request.model,
            "prompt": prompt,
            "stream": false,
            "temperature": request.temperature,
        });

        let response = self
            .http
            .post(&self.api_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "model endpoint unreachable");
                ClientError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model endpoint error");
            return Err(ClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()))?;

        let text = body
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ClientError::Protocol("response body missing `response` field".to_string())
            })?;

        debug!(chars = text.len(), "generation complete");
        Ok(text.to_string())
    }
}
