//! OpenAI provider (chat completions API). The fallback model of the chain.

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
    classify_transport_error, truncate_body, ChatMessage, LlmErrorKind, LlmFailure, Provider,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: OpenAiContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum OpenAiPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Serialize)]
struct OpenAiImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl OpenAiProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_key: settings.openai_api_key.clone(),
            model: settings.fallback_model.clone(),
            temperature: settings.llm_temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn classify_error_body(&self, status: u16, body: &str) -> LlmFailure {
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let kind = match parsed.error.error_type.as_deref() {
                Some("invalid_api_key") | Some("invalid_request_error")
                    if parsed.error.message.contains("API key") =>
                {
                    LlmErrorKind::InvalidCredentials
                }
                Some("invalid_api_key") | Some("invalid_organization") => {
                    LlmErrorKind::InvalidCredentials
                }
                _ => LlmErrorKind::Processing,
            };
            if kind == LlmErrorKind::InvalidCredentials {
                return LlmFailure::new(kind, self.name(), parsed.error.message);
            }
            return classify_transport_error(
                self.name(),
                format!("HTTP {}: {}", status, parsed.error.message),
            );
        }
        classify_transport_error(
            self.name(),
            format!("HTTP {}: {}", status, truncate_body(body, 500)),
        )
    }

    async fn send(&self, messages: Vec<OpenAiMessage>) -> Result<Value, LlmFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmFailure::not_configured(self.name()));
        };

        let request = OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        };

        info!("LLM {}: request sent, waiting for response...", self.name());
        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
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
            return Err(self.classify_error_body(status.as_u16(), &body));
        }

        let parsed: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|e| classify_transport_error(self.name(), format!("Malformed response: {e}")))?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
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
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn invoke_vision(&self, prompt: &str, image: &[u8]) -> Result<Value, LlmFailure> {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image));
        let messages = vec![OpenAiMessage {
            role: "user".to_string(),
            content: OpenAiContent::Parts(vec![
                OpenAiPart::Text {
                    text: prompt.to_string(),
                },
                OpenAiPart::ImageUrl {
                    image_url: OpenAiImageUrl { url: data_url },
                },
            ]),
        }];
        self.send(messages).await
    }

    async fn invoke_text(&self, messages: &[ChatMessage]) -> Result<Value, LlmFailure> {
        let messages = messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: OpenAiContent::Text(m.content.clone()),
            })
            .collect();
        self.send(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_key() -> OpenAiProvider {
        let mut settings = Settings::for_tests();
        settings.openai_api_key = Some("test-key".to_string());
        OpenAiProvider::new(&settings)
    }

    #[test]
    fn test_configuration() {
        let settings = Settings::for_tests();
        assert!(!OpenAiProvider::new(&settings).is_configured());
        assert!(provider_with_key().is_configured());
    }

    #[tokio::test]
    async fn test_invoke_without_key_is_config_error() {
        let settings = Settings::for_tests();
        let provider = OpenAiProvider::new(&settings);
        let err = provider
            .invoke_text(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Config);
    }

    #[test]
    fn test_error_body_classification() {
        let provider = provider_with_key();
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_api_key"}}"#;
        let failure = provider.classify_error_body(401, body);
        assert_eq!(failure.kind, LlmErrorKind::InvalidCredentials);

        let body = r#"{"error": {"message": "overloaded", "type": "server_error"}}"#;
        let failure = provider.classify_error_body(500, body);
        assert_eq!(failure.kind, LlmErrorKind::Processing);
    }

    #[test]
    fn test_vision_message_serialization() {
        let message = OpenAiMessage {
            role: "user".to_string(),
            content: OpenAiContent::Parts(vec![
                OpenAiPart::Text { text: "p".into() },
                OpenAiPart::ImageUrl {
                    image_url: OpenAiImageUrl {
                        url: "data:image/jpeg;base64,QUJD".into(),
                    },
                },
            ]),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "image_url");
        assert!(value["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }
}
