//! Ollama provider (local models, no credentials required).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::Settings;

use super::parse::extract_json;
use super::provider::{
    classify_transport_error, truncate_body, ChatMessage, LlmFailure, Provider,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: Option<String>,
}

impl OllamaProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base_url: settings.ollama_base_url.trim_end_matches('/').to_string(),
            model: settings.ollama_model.clone(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn send(&self, messages: Vec<OllamaMessage>) -> Result<Value, LlmFailure> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };

        info!("LLM {}: request sent, waiting for response...", self.name());
        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(self.name(), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(self.name(), e.to_string()))?;

        if !status.is_success() {
            return Err(classify_transport_error(
                self.name(),
                format!("HTTP {}: {}", status.as_u16(), truncate_body(&body, 500)),
            ));
        }

        let parsed: OllamaResponse = serde_json::from_str(&body)
            .map_err(|e| classify_transport_error(self.name(), format!("Malformed response: {e}")))?;
        let text = parsed
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        info!(
            "LLM {}: response received in {:.2}s, length={} chars",
            self.name(),
            start.elapsed().as_secs_f64(),
            text.len()
        );
        extract_json(self.name(), &text)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    /// Ollama has no API key; assume configured.
    fn is_configured(&self) -> bool {
        true
    }

    async fn invoke_vision(&self, prompt: &str, image: &[u8]) -> Result<Value, LlmFailure> {
        let messages = vec![OllamaMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
            images: Some(vec![BASE64.encode(image)]),
        }];
        self.send(messages).await
    }

    async fn invoke_text(&self, messages: &[ChatMessage]) -> Result<Value, LlmFailure> {
        let messages = messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
                images: None,
            })
            .collect();
        self.send(messages).await
    }
}
