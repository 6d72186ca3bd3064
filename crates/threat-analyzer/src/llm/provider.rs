//! The `Provider` capability and its tagged error type.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Classified provider failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Provider cannot be used: credentials or endpoint missing.
    Config,
    /// The service rejected the credentials.
    InvalidCredentials,
    /// The model returned no text.
    Empty,
    /// The model returned text with no parseable JSON.
    InvalidJson,
    /// Any other invocation failure (transport, timeout, 5xx, ...).
    Processing,
}

impl LlmErrorKind {
    /// Wire tag, matching the error taxonomy used across services.
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmErrorKind::Config => "config",
            LlmErrorKind::InvalidCredentials => "invalid_api_key",
            LlmErrorKind::Empty => "empty",
            LlmErrorKind::InvalidJson => "invalid_json",
            LlmErrorKind::Processing => "processing_error",
        }
    }
}

/// Tagged error returned by a provider invocation.
#[derive(Debug, Clone)]
pub struct LlmFailure {
    pub kind: LlmErrorKind,
    pub message: String,
    pub provider: String,
}

impl LlmFailure {
    pub fn new(kind: LlmErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
        }
    }

    /// Standard failure for a provider that is missing configuration.
    pub fn not_configured(provider: &str) -> Self {
        Self::new(
            LlmErrorKind::Config,
            provider,
            format!("{provider} not configured"),
        )
    }
}

impl fmt::Display for LlmFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.provider, self.kind.as_str(), self.message)
    }
}

impl std::error::Error for LlmFailure {}

/// First `max` characters of a response body, for error reporting.
pub fn truncate_body(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Classify a transport-level error message. Credential-shaped messages
/// (mentioning an API key, a 401, or "invalid") become
/// `InvalidCredentials`; everything else is `Processing`.
pub fn classify_transport_error(provider: &str, message: impl Into<String>) -> LlmFailure {
    let message = message.into();
    let lowered = message.to_lowercase();
    let kind = if message.contains("API key") || message.contains("401") || lowered.contains("invalid")
    {
        LlmErrorKind::InvalidCredentials
    } else {
        LlmErrorKind::Processing
    };
    LlmFailure::new(kind, provider, message)
}

/// Chat roles supported by the text invocation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// One message in a text invocation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Proxy to a specific LLM service. Implementations share the JSON
/// extraction and error classification in `parse` / this module.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name for logging and engine-error reports.
    fn name(&self) -> &str;

    /// True iff the provider can be used without further I/O (credentials
    /// present). Providers with no credentials report true unconditionally.
    fn is_configured(&self) -> bool;

    /// Invoke with an image plus prompt; returns the parsed JSON value.
    async fn invoke_vision(&self, prompt: &str, image: &[u8]) -> Result<Value, LlmFailure>;

    /// Invoke with text messages only; returns the parsed JSON value.
    async fn invoke_text(&self, messages: &[ChatMessage]) -> Result<Value, LlmFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_credential_errors() {
        let f = classify_transport_error("Gemini", "API key not valid");
        assert_eq!(f.kind, LlmErrorKind::InvalidCredentials);
        let f = classify_transport_error("OpenAI", "HTTP 401: unauthorized");
        assert_eq!(f.kind, LlmErrorKind::InvalidCredentials);
        let f = classify_transport_error("OpenAI", "Invalid organization");
        assert_eq!(f.kind, LlmErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_classify_generic_errors() {
        let f = classify_transport_error("Ollama", "connection refused");
        assert_eq!(f.kind, LlmErrorKind::Processing);
        assert_eq!(f.provider, "Ollama");
    }

    #[test]
    fn test_truncate_body_char_safe() {
        assert_eq!(truncate_body("abcdef", 3), "abc");
        assert_eq!(truncate_body("açãо", 3), "açã");
        assert_eq!(truncate_body("ab", 500), "ab");
    }

    #[test]
    fn test_not_configured_failure() {
        let f = LlmFailure::not_configured("Gemini");
        assert_eq!(f.kind, LlmErrorKind::Config);
        assert_eq!(f.message, "Gemini not configured");
    }
}
