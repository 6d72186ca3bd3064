//! Analyzer settings, loaded once at startup and passed by reference.

use std::path::PathBuf;

use threat_shared::{env_opt, env_or, env_parse_or, parse_cors_origins};

/// Application settings for the analyzer service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub port: u16,

    /// Network cache tier endpoint. `None` disables Redis and falls back to
    /// the in-memory backend.
    pub redis_url: Option<String>,

    // LLM provider settings
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_base_url: String,
    pub ollama_model: String,

    // Model settings
    pub primary_model: String,
    pub fallback_model: String,
    pub embedding_model: String,
    pub llm_temperature: f32,

    // RAG settings
    pub knowledge_base_path: PathBuf,
    pub rag_chunk_size: usize,
    pub rag_chunk_overlap: usize,

    // File upload settings
    pub max_upload_size_mb: u64,
    pub allowed_image_types: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Threat Modeling AI"),
            app_version: env_or("APP_VERSION", "1.0.0"),
            log_level: env_or("LOG_LEVEL", "INFO"),
            cors_origins: parse_cors_origins(&env_or("CORS_ORIGINS", "*")),
            port: env_parse_or("PORT", 8001),
            redis_url: Some(env_or("REDIS_URL", "redis://localhost:6379/0")),
            google_api_key: env_opt("GOOGLE_API_KEY"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            ollama_base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: env_or("OLLAMA_MODEL", "qwen2-vl"),
            primary_model: env_or("PRIMARY_MODEL", "gemini-1.5-pro"),
            fallback_model: env_or("FALLBACK_MODEL", "gpt-4o"),
            embedding_model: env_or("EMBEDDING_MODEL", "models/embedding-001"),
            llm_temperature: env_parse_or("LLM_TEMPERATURE", 0.0),
            knowledge_base_path: PathBuf::from(env_or("KNOWLEDGE_BASE_PATH", "rag_data")),
            rag_chunk_size: env_parse_or("RAG_CHUNK_SIZE", 800),
            rag_chunk_overlap: env_parse_or("RAG_CHUNK_OVERLAP", 80),
            max_upload_size_mb: env_parse_or("MAX_UPLOAD_SIZE_MB", 10),
            allowed_image_types: env_or(
                "ALLOWED_IMAGE_TYPES",
                "image/jpeg,image/png,image/webp,image/gif",
            )
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        }
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
impl Settings {
    /// Settings for unit tests: no credentials, no Redis, tiny defaults.
    pub fn for_tests() -> Self {
        Self {
            app_name: "Threat Modeling AI".to_string(),
            app_version: "1.0.0".to_string(),
            log_level: "INFO".to_string(),
            cors_origins: vec!["*".to_string()],
            port: 0,
            redis_url: None,
            google_api_key: None,
            openai_api_key: None,
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "qwen2-vl".to_string(),
            primary_model: "gemini-1.5-pro".to_string(),
            fallback_model: "gpt-4o".to_string(),
            embedding_model: "models/embedding-001".to_string(),
            llm_temperature: 0.0,
            knowledge_base_path: PathBuf::from("rag_data"),
            rag_chunk_size: 800,
            rag_chunk_overlap: 80,
            max_upload_size_mb: 10,
            allowed_image_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_upload_size_bytes() {
        let settings = Settings::for_tests();
        assert_eq!(settings.max_upload_size_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_default_allowed_types() {
        let settings = Settings::for_tests();
        assert!(settings.allowed_image_types.contains(&"image/png".to_string()));
        assert_eq!(settings.allowed_image_types.len(), 4);
    }
}
