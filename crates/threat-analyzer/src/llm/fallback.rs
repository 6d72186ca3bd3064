//! Fallback runner: try providers in order, validate, return first success.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::cache::LlmCache;
use super::provider::{ChatMessage, LlmFailure, Provider};

/// One recorded provider failure inside a fallback run.
#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub engine: String,
    pub error: String,
    pub error_type: String,
}

impl EngineError {
    fn from_failure(failure: &LlmFailure) -> Self {
        Self {
            engine: failure.provider.clone(),
            error: failure.message.clone(),
            error_type: failure.kind.as_str().to_string(),
        }
    }
}

/// Returned when every provider in the chain failed or was skipped.
#[derive(Debug, Clone)]
pub struct FallbackFailure {
    pub message: String,
    pub engine_errors: Vec<EngineError>,
}

impl FallbackFailure {
    fn exhausted(engine_errors: Vec<EngineError>) -> Self {
        Self {
            message: "All LLM providers failed".to_string(),
            engine_errors,
        }
    }
}

fn messages_json(messages: &[ChatMessage]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect(),
    )
}

/// Check a cached value against the stage validator; return it on acceptance.
async fn cached_result<F>(
    cache: Option<&LlmCache>,
    namespace: &str,
    cache_parts: &[Value],
    validate: &F,
) -> Option<Value>
where
    F: Fn(&Value) -> bool,
{
    let cached = cache?.get(namespace, cache_parts).await?;
    if validate(&cached) {
        info!("Returning cached LLM result for {}", namespace);
        Some(cached)
    } else {
        None
    }
}

/// Record a validator rejection for the engine-error report.
fn rejection_error(provider: &dyn Provider, rejected: &Value) -> EngineError {
    warn!("{} returned a result that failed validation", provider.name());
    EngineError {
        engine: provider.name().to_string(),
        error: format!("Response failed validation: {}", truncate(rejected, 200)),
        error_type: "validation".to_string(),
    }
}

/// Try each provider's vision invocation in order; return the first result
/// the validator accepts, or the aggregated provider errors.
pub async fn run_vision_with_fallback<F>(
    providers: &[Arc<dyn Provider>],
    prompt: &str,
    image: &[u8],
    cache: Option<&LlmCache>,
    namespace: &str,
    validate: F,
) -> Result<Value, FallbackFailure>
where
    F: Fn(&Value) -> bool,
{
    let cache_parts = vec![json!(prompt), json!(hex::encode(Sha256::digest(image)))];
    if let Some(cached) = cached_result(cache, namespace, &cache_parts, &validate).await {
        return Ok(cached);
    }

    let mut errors: Vec<EngineError> = Vec::new();
    for provider in providers {
        if !provider.is_configured() {
            debug!("{} not configured, skipping", provider.name());
            continue;
        }
        info!("Trying LLM: {}", provider.name());
        match provider.invoke_vision(prompt, image).await {
            Ok(result) if validate(&result) => {
                info!("Success with {}", provider.name());
                if let Some(cache) = cache {
                    cache.put(namespace, &cache_parts, &result).await;
                }
                return Ok(result);
            }
            Ok(rejected) => errors.push(rejection_error(provider.as_ref(), &rejected)),
            Err(failure) => {
                warn!("{} failed: {}", provider.name(), failure);
                errors.push(EngineError::from_failure(&failure));
            }
        }
    }

    Err(FallbackFailure::exhausted(errors))
}

/// Text counterpart of [`run_vision_with_fallback`]; the cache key is
/// derived from the canonical JSON of the message list.
pub async fn run_text_with_fallback<F>(
    providers: &[Arc<dyn Provider>],
    messages: &[ChatMessage],
    cache: Option<&LlmCache>,
    namespace: &str,
    validate: F,
) -> Result<Value, FallbackFailure>
where
    F: Fn(&Value) -> bool,
{
    let cache_parts = vec![messages_json(messages)];
    if let Some(cached) = cached_result(cache, namespace, &cache_parts, &validate).await {
        return Ok(cached);
    }

    let mut errors: Vec<EngineError> = Vec::new();
    for provider in providers {
        if !provider.is_configured() {
            debug!("{} not configured, skipping", provider.name());
            continue;
        }
        info!("Trying LLM: {}", provider.name());
        match provider.invoke_text(messages).await {
            Ok(result) if validate(&result) => {
                info!("Success with {}", provider.name());
                if let Some(cache) = cache {
                    cache.put(namespace, &cache_parts, &result).await;
                }
                return Ok(result);
            }
            Ok(rejected) => errors.push(rejection_error(provider.as_ref(), &rejected)),
            Err(failure) => {
                warn!("{} failed: {}", provider.name(), failure);
                errors.push(EngineError::from_failure(&failure));
            }
        }
    }

    Err(FallbackFailure::exhausted(errors))
}

fn truncate(value: &Value, max: usize) -> String {
    let mut rendered = value.to_string();
    if rendered.len() > max {
        let mut end = max;
        while !rendered.is_char_boundary(end) {
            end -= 1;
        }
        rendered.truncate(end);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{LlmErrorKind, Role};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use threat_shared::MemoryCacheBackend;

    struct MockProvider {
        name: String,
        configured: bool,
        result: Result<Value, LlmFailure>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn ok(name: &str, value: Value) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: true,
                result: Ok(value),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &str, kind: LlmErrorKind) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: true,
                result: Err(LlmFailure::new(kind, name, "boom")),
                calls: AtomicUsize::new(0),
            })
        }

        fn unconfigured(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: false,
                result: Err(LlmFailure::not_configured(name)),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn invoke_vision(&self, _prompt: &str, _image: &[u8]) -> Result<Value, LlmFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        async fn invoke_text(&self, _messages: &[ChatMessage]) -> Result<Value, LlmFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn any(_: &Value) -> bool {
        true
    }

    #[tokio::test]
    async fn test_first_provider_success_short_circuits() {
        let first = MockProvider::ok("First", json!({"components": []}));
        let second = MockProvider::ok("Second", json!({"components": ["x"]}));
        let providers: Vec<Arc<dyn Provider>> = vec![first.clone(), second.clone()];

        let result = run_vision_with_fallback(&providers, "p", b"img", None, "diagram", any)
            .await
            .unwrap();
        assert_eq!(result, json!({"components": []}));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_to_second_provider() {
        let first = MockProvider::failing("First", LlmErrorKind::Processing);
        let second = MockProvider::ok("Second", json!({"components": [1]}));
        let providers: Vec<Arc<dyn Provider>> = vec![first, second.clone()];

        let result = run_vision_with_fallback(&providers, "p", b"img", None, "diagram", any)
            .await
            .unwrap();
        assert_eq!(result, json!({"components": [1]}));
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_providers_are_skipped() {
        let skipped = MockProvider::unconfigured("Skipped");
        let ok = MockProvider::ok("Ok", json!([]));
        let providers: Vec<Arc<dyn Provider>> = vec![skipped.clone(), ok];

        let result =
            run_text_with_fallback(&providers, &[ChatMessage::user("hi")], None, "stride", any)
                .await
                .unwrap();
        assert_eq!(result, json!([]));
        assert_eq!(skipped.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_fail_aggregates_engine_errors() {
        let a = MockProvider::failing("Gemini", LlmErrorKind::InvalidCredentials);
        let b = MockProvider::failing("OpenAI", LlmErrorKind::Processing);
        let providers: Vec<Arc<dyn Provider>> = vec![a, b];

        let failure = run_vision_with_fallback(&providers, "p", b"img", None, "diagram", any)
            .await
            .unwrap_err();
        assert_eq!(failure.message, "All LLM providers failed");
        let engines: Vec<&str> = failure
            .engine_errors
            .iter()
            .map(|e| e.engine.as_str())
            .collect();
        assert_eq!(engines, vec!["Gemini", "OpenAI"]);
        assert_eq!(failure.engine_errors[0].error_type, "invalid_api_key");
    }

    #[tokio::test]
    async fn test_validator_rejection_continues_chain() {
        let invalid = MockProvider::ok("Invalid", json!({"error": "nope"}));
        let valid = MockProvider::ok("Valid", json!({"components": []}));
        let providers: Vec<Arc<dyn Provider>> = vec![invalid, valid];

        let validate = |v: &Value| v.get("error").is_none();
        let result = run_vision_with_fallback(&providers, "p", b"img", None, "diagram", validate)
            .await
            .unwrap();
        assert_eq!(result, json!({"components": []}));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let cache = LlmCache::new(Arc::new(MemoryCacheBackend::new()));
        let provider = MockProvider::ok("P", json!({"fresh": true}));
        let providers: Vec<Arc<dyn Provider>> = vec![provider.clone()];

        // Prime the cache through one real invocation.
        let first =
            run_vision_with_fallback(&providers, "p", b"img", Some(&cache), "diagram", any)
                .await
                .unwrap();
        assert_eq!(first, json!({"fresh": true}));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // Second identical call must be served from cache.
        let second =
            run_vision_with_fallback(&providers, "p", b"img", Some(&cache), "diagram", any)
                .await
                .unwrap();
        assert_eq!(second, json!({"fresh": true}));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_cached_value_is_ignored() {
        let cache = LlmCache::new(Arc::new(MemoryCacheBackend::new()));
        let parts = vec![
            json!("p"),
            json!(hex::encode(Sha256::digest(b"img" as &[u8]))),
        ];
        cache.put("diagram", &parts, &json!({"error": "stale"})).await;

        let provider = MockProvider::ok("P", json!({"components": []}));
        let providers: Vec<Arc<dyn Provider>> = vec![provider.clone()];
        let validate = |v: &Value| v.get("error").is_none();

        let result =
            run_vision_with_fallback(&providers, "p", b"img", Some(&cache), "diagram", validate)
                .await
                .unwrap();
        assert_eq!(result, json!({"components": []}));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
