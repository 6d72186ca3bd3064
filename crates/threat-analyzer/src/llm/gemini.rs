//! Gemini provider (Google Generative Language API).

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
    classify_transport_error, truncate_body, ChatMessage, LlmFailure, Provider, Role,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini connection. The primary (vision-capable) model of the chain.
pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_key: settings.google_api_key.clone(),
            model: settings.primary_model.clone(),
            temperature: settings.llm_temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        )
    }

    async fn send(&self, request: GeminiRequest) -> Result<Value, LlmFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmFailure::not_configured(self.name()));
        };

        info!("LLM {}: request sent, waiting for response...", self.name());
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint(api_key))
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

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| classify_transport_error(self.name(), format!("Malformed response: {e}")))?;
        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
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
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn invoke_vision(&self, prompt: &str, image: &[u8]) -> Result<Value, LlmFailure> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![
                    GeminiPart::text(prompt),
                    GeminiPart::image("image/jpeg", BASE64.encode(image)),
                ],
            }],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };
        self.send(request).await
    }

    async fn invoke_text(&self, messages: &[ChatMessage]) -> Result<Value, LlmFailure> {
        let system_instruction = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(&m.content)],
            });
        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(&m.content)],
            })
            .collect();

        let request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };
        self.send(request).await
    }
}
