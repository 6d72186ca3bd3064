//! Two-tier response cache shared by the LLM call sites.
//!
//! A `CacheBackend` is the network tier (Redis in deployment, an in-memory
//! map in tests or when no Redis URL is configured). `TieredCache` layers a
//! process-local moka cache on top for hot-path reads. Backend failures are
//! logged and degrade to a miss; they never propagate into the pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

/// Default TTL for cached LLM responses: 2 hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Storage tier for cached values. Keys and values are plain strings;
/// callers serialize JSON before storing.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value; `None` on miss, expiry, or backend failure.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value with an absolute TTL. Failures are swallowed.
    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// Redis-backed network tier. The connection is established lazily on first
/// use so that constructing the cache never blocks startup.
pub struct RedisCacheBackend {
    url: String,
    manager: OnceCell<ConnectionManager>,
}

impl RedisCacheBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            manager: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let client = redis::Client::open(self.url.as_str())?;
                ConnectionManager::new(client).await
            })
            .await;
        match manager {
            Ok(m) => Some(m.clone()),
            Err(e) => {
                warn!("Redis connection failed ({}): {}", self.url, e);
                None
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache get failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
        {
            warn!("Cache set failed for {}: {}", key, e);
        }
    }
}

/// In-memory network-tier stand-in with absolute expiry. Used by tests and
/// when no Redis URL is configured.
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
    }
}

/// Process-local tier over a network tier. Reads hit the moka cache first;
/// network hits are promoted locally so repeated reads stay in-process.
pub struct TieredCache {
    local: moka::future::Cache<String, String>,
    backend: Arc<dyn CacheBackend>,
}

impl TieredCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_ttl(backend, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        let local = moka::future::Cache::builder()
            .max_capacity(1024)
            .time_to_live(ttl)
            .build();
        Self { local, backend }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.local.get(key).await {
            debug!("Cache hit (local) for {}", key);
            return Some(value);
        }
        let value = self.backend.get(key).await?;
        debug!("Cache hit (network) for {}", key);
        self.local.insert(key.to_string(), value.clone()).await;
        Some(value)
    }

    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.local.insert(key.to_string(), value.clone()).await;
        self.backend.set(key, value, ttl).await;
    }
}

/// Select the network tier from configuration: Redis when a URL is given,
/// otherwise the in-memory stand-in.
pub fn get_cache_backend(redis_url: Option<&str>) -> Arc<dyn CacheBackend> {
    match redis_url {
        Some(url) => Arc::new(RedisCacheBackend::new(url)),
        None => Arc::new(MemoryCacheBackend::new()),
    }
}

/// Serialize a JSON value with object keys sorted recursively.
///
/// Cache keys must be identical across processes, so the serialization
/// cannot depend on map insertion order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Derive a deterministic cache key: `llm:<namespace>:<sha256 hex>` over the
/// canonical JSON of the input parts.
pub fn cache_key(namespace: &str, parts: &[Value]) -> String {
    let canonical = canonical_json(&Value::Array(parts.to_vec()));
    let digest = Sha256::digest(canonical.as_bytes());
    format!("llm:{}:{}", namespace, hex::encode(digest))
}
