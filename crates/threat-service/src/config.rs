//! Orchestrator settings, loaded once at startup.

use std::path::PathBuf;

use threat_shared::{env_or, env_parse_or, parse_cors_origins};

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub port: u16,

    pub database_url: String,

    /// Base URL of the analyzer service.
    pub analyzer_url: String,
    /// Deadline for one outbound analysis call.
    pub analyzer_timeout_secs: u64,

    /// Root directory for uploaded diagram images.
    pub storage_root: PathBuf,
    pub max_upload_size_mb: u64,
    pub allowed_image_types: Vec<String>,

    /// Cadence of the pending-work scan.
    pub scan_interval_secs: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Threat Modeling AI"),
            app_version: env_or("APP_VERSION", "1.0.0"),
            log_level: env_or("LOG_LEVEL", "INFO"),
            cors_origins: parse_cors_origins(&env_or("CORS_ORIGINS", "*")),
            port: env_parse_or("PORT", 8000),
            database_url: env_or("DATABASE_URL", "postgresql://localhost:5432/threat_modeling"),
            analyzer_url: env_or("ANALYZER_URL", "http://localhost:8001"),
            analyzer_timeout_secs: env_parse_or("ANALYZER_TIMEOUT_SECS", 300),
            storage_root: PathBuf::from(env_or("STORAGE_ROOT", "storage/uploads")),
            max_upload_size_mb: env_parse_or("MAX_UPLOAD_SIZE_MB", 10),
            allowed_image_types: env_or(
                "ALLOWED_IMAGE_TYPES",
                "image/jpeg,image/png,image/webp,image/gif",
            )
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
            scan_interval_secs: env_parse_or("SCAN_INTERVAL_SECS", 60),
        }
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}
