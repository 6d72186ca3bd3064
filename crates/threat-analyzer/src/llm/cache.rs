//! LLM response cache adapter: namespaced keys over the shared tiered cache.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use threat_shared::{cache_key, CacheBackend, TieredCache, DEFAULT_CACHE_TTL};

/// Cache for parsed LLM responses. Keys are `llm:<namespace>:<sha256>` over
/// the canonical JSON of the request parts; values are JSON-serialized.
pub struct LlmCache {
    cache: TieredCache,
}

impl LlmCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            cache: TieredCache::new(backend),
        }
    }

    pub async fn get(&self, namespace: &str, parts: &[Value]) -> Option<Value> {
        let key = cache_key(namespace, parts);
        let raw = self.cache.get(&key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cache entry for {} is not valid JSON: {}", key, e);
                None
            }
        }
    }

    pub async fn put(&self, namespace: &str, parts: &[Value], value: &Value) {
        let key = cache_key(namespace, parts);
        match serde_json::to_string(value) {
            Ok(raw) => self.cache.set(&key, raw, DEFAULT_CACHE_TTL).await,
            Err(e) => warn!("Cache serialization failed for {}: {}", key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threat_shared::MemoryCacheBackend;

    #[tokio::test]
    async fn test_roundtrip() {
        let cache = LlmCache::new(Arc::new(MemoryCacheBackend::new()));
        let parts = vec![json!("prompt"), json!("abc123")];
        assert!(cache.get("diagram", &parts).await.is_none());
        cache
            .put("diagram", &parts, &json!({"components": []}))
            .await;
        assert_eq!(
            cache.get("diagram", &parts).await,
            Some(json!({"components": []}))
        );
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let cache = LlmCache::new(Arc::new(MemoryCacheBackend::new()));
        let parts = vec![json!("same")];
        cache.put("stride", &parts, &json!([1])).await;
        assert!(cache.get("dread", &parts).await.is_none());
    }
}
