//! Schema bootstrap, executed once at startup.

use anyhow::{Context, Result};
use sqlx::PgPool;

const SCHEMA_SQL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS analysis_code_seq;

CREATE TABLE IF NOT EXISTS analyses (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    image_path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'EM_ABERTO',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    started_at TIMESTAMPTZ,
    finished_at TIMESTAMPTZ,
    result JSONB,
    processing_logs TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_analyses_status ON analyses (status);
CREATE INDEX IF NOT EXISTS idx_analyses_created_at ON analyses (created_at);

CREATE TABLE IF NOT EXISTS notifications (
    id UUID PRIMARY KEY,
    analysis_id UUID NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
    title VARCHAR(255) NOT NULL,
    message TEXT NOT NULL,
    is_read BOOLEAN NOT NULL DEFAULT FALSE,
    link VARCHAR(500) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_notifications_is_read ON notifications (is_read);
"#;

/// Create tables, sequence, and indexes when they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("Failed to initialize database schema")?;
    Ok(())
}
