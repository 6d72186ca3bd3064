//! LLM provider abstraction, fallback runner, response parsing, and cache.
//!
//! A `Provider` is a proxy to one vision/text model service. The fallback
//! runner tries providers in order until one produces a response that the
//! stage validator accepts; shared parsing and error classification live in
//! `parse` as free functions consumed by every implementation.

pub mod cache;
pub mod fallback;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod parse;
pub mod provider;

pub use cache::LlmCache;
pub use fallback::{
    run_text_with_fallback, run_vision_with_fallback, EngineError, FallbackFailure,
};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use parse::extract_json;
pub use provider::{ChatMessage, LlmErrorKind, LlmFailure, Provider, Role};

use std::sync::Arc;

use crate::config::Settings;

/// Default provider order: Gemini, then OpenAI, then Ollama.
pub fn default_providers(settings: &Settings) -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(GeminiProvider::new(settings)),
        Arc::new(OpenAiProvider::new(settings)),
        Arc::new(OllamaProvider::new(settings)),
    ]
}
