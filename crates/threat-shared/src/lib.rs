//! Shared runtime for the threat modeling services.
//!
//! Both the orchestrator (`threat-service`) and the analyzer
//! (`threat-analyzer`) pull their ambient plumbing from here: environment
//! configuration helpers, tracing setup, the two-tier LLM response cache,
//! the standard health endpoints, and Postgres pool glue.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod logging;

pub use cache::{
    cache_key, canonical_json, get_cache_backend, CacheBackend, MemoryCacheBackend,
    RedisCacheBackend, TieredCache, DEFAULT_CACHE_TTL,
};
pub use config::{cors_layer, env_opt, env_or, env_parse_or, parse_cors_origins};
pub use db::{connect_pool, db_check};
pub use error::ErrorBody;
pub use health::health_router;
pub use logging::init_tracing;
