//! Environment configuration helpers shared by both services.
//!
//! Rust has no settings-class inheritance, so each service owns a flat
//! `Settings` struct built from these helpers in its `from_env()`.

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Read an env var, falling back to a default when unset or empty.
pub fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// Read an optional env var; empty values count as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an env var, falling back to a default on absence or parse failure.
pub fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse CORS origins from a comma-separated string. `"*"` (or nothing) allows all.
pub fn parse_cors_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

/// Build a CORS layer from parsed origins.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(values))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cors_origins_star() {
        assert_eq!(parse_cors_origins("*"), vec!["*"]);
        assert_eq!(parse_cors_origins(""), vec!["*"]);
    }

    #[test]
    fn test_parse_cors_origins_list() {
        let origins = parse_cors_origins("http://localhost:3000, https://app.example.com");
        assert_eq!(
            origins,
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or("THREAT_SHARED_TEST_UNSET", "fallback"), "fallback");
    }

    #[test]
    fn test_env_parse_or_default() {
        assert_eq!(env_parse_or::<u64>("THREAT_SHARED_TEST_UNSET_NUM", 42), 42);
    }
}
