//! Repository for analysis records. The single-row compare-and-set in
//! `mark_processing` is the entire multi-writer safety mechanism: exactly
//! one claimant can move a record out of `EM_ABERTO`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{Analysis, AnalysisStatus};

/// Listing filters: code substring, status, creation date range (inclusive).
#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub code: Option<String>,
    pub status: Option<AnalysisStatus>,
    pub created_at_from: Option<NaiveDate>,
    pub created_at_to: Option<NaiveDate>,
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: Uuid,
    code: String,
    image_path: String,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    result: Option<Value>,
    processing_logs: Option<String>,
    error_message: Option<String>,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = anyhow::Error;

    fn try_from(row: AnalysisRow) -> Result<Self> {
        let status = row
            .status
            .parse::<AnalysisStatus>()
            .map_err(|e| anyhow!(e))?;
        Ok(Analysis {
            id: row.id,
            code: row.code,
            image_path: row.image_path,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            result: row.result,
            processing_logs: row.processing_logs,
            error_message: row.error_message,
        })
    }
}

const SELECT_COLUMNS: &str = "id, code, image_path, status, created_at, started_at, \
                              finished_at, result, processing_logs, error_message";

/// Repository for analysis database operations.
pub struct AnalysisRepository;

impl AnalysisRepository {
    /// Insert a new record in state `EM_ABERTO` with the next monotonic
    /// code (`TMA-001`, `TMA-002`, ...) from the backing sequence. Codes
    /// past 999 keep growing (`TMA-1000`); the zero-padding is a minimum
    /// width, not a cap.
    pub async fn create(pool: &PgPool, image_path: &str) -> Result<Analysis> {
        let sequence: i64 = sqlx::query_scalar("SELECT nextval('analysis_code_seq')")
            .fetch_one(pool)
            .await
            .context("Failed to advance analysis code sequence")?;
        let code = format!("TMA-{sequence:03}");

        let row = sqlx::query_as::<_, AnalysisRow>(&format!(
            r#"
            INSERT INTO analyses (id, code, image_path, status)
            VALUES ($1, $2, $3, 'EM_ABERTO')
            RETURNING {SELECT_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(&code)
        .bind(image_path)
        .fetch_one(pool)
        .await
        .context("Failed to create analysis")?;

        row.try_into()
    }

    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Analysis>> {
        let row = sqlx::query_as::<_, AnalysisRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM analyses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch analysis")?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn get_image_path(pool: &PgPool, id: Uuid) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT image_path FROM analyses WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to fetch analysis image path")
    }

    /// Filtered, paginated listing (newest first) plus the total count.
    pub async fn list_all(
        pool: &PgPool,
        filter: &AnalysisFilter,
        page: i64,
        size: i64,
    ) -> Result<(Vec<Analysis>, i64)> {
        let offset = (page.max(1) - 1) * size;
        let status = filter.status.map(|s| s.as_str().to_string());

        let rows = sqlx::query_as::<_, AnalysisRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM analyses
            WHERE ($1::text IS NULL OR code ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR status = $2)
              AND ($3::date IS NULL OR created_at >= $3::date)
              AND ($4::date IS NULL OR created_at < $4::date + INTERVAL '1 day')
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        ))
        .bind(&filter.code)
        .bind(&status)
        .bind(filter.created_at_from)
        .bind(filter.created_at_to)
        .bind(size)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list analyses")?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM analyses
            WHERE ($1::text IS NULL OR code ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR status = $2)
              AND ($3::date IS NULL OR created_at >= $3::date)
              AND ($4::date IS NULL OR created_at < $4::date + INTERVAL '1 day')
            "#,
        )
        .bind(&filter.code)
        .bind(&status)
        .bind(filter.created_at_from)
        .bind(filter.created_at_to)
        .fetch_one(pool)
        .await
        .context("Failed to count analyses")?;

        let analyses = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>>>()?;
        Ok((analyses, total))
    }

    /// Atomic claim: `EM_ABERTO -> PROCESSANDO`. The write succeeds only
    /// when the current state is still `EM_ABERTO`; returns whether this
    /// caller won the claim.
    pub async fn mark_processing(
        pool: &PgPool,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE analyses SET status = 'PROCESSANDO', started_at = $2 \
             WHERE id = $1 AND status = 'EM_ABERTO'",
        )
        .bind(id)
        .bind(started_at)
        .execute(pool)
        .await
        .context("Failed to mark analysis as processing")?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal transition `PROCESSANDO -> ANALISADO`, storing the result.
    pub async fn mark_analysed(
        pool: &PgPool,
        id: Uuid,
        finished_at: DateTime<Utc>,
        result: &Value,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            "UPDATE analyses SET status = 'ANALISADO', finished_at = $2, result = $3 \
             WHERE id = $1 AND status = 'PROCESSANDO'",
        )
        .bind(id)
        .bind(finished_at)
        .bind(result)
        .execute(pool)
        .await
        .context("Failed to mark analysis as analysed")?;

        Ok(outcome.rows_affected() == 1)
    }

    /// Terminal transition `PROCESSANDO -> FALHOU` with the error message.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        finished_at: DateTime<Utc>,
        error_message: &str,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            "UPDATE analyses SET status = 'FALHOU', finished_at = $2, error_message = $3 \
             WHERE id = $1 AND status = 'PROCESSANDO'",
        )
        .bind(id)
        .bind(finished_at)
        .bind(error_message)
        .execute(pool)
        .await
        .context("Failed to mark analysis as failed")?;

        Ok(outcome.rows_affected() == 1)
    }

    /// Append a timestamped line to the processing log.
    pub async fn append_processing_log(pool: &PgPool, id: Uuid, line: &str) -> Result<()> {
        let entry = format!("[{}] {}\n", Utc::now().to_rfc3339(), line);
        sqlx::query(
            "UPDATE analyses SET processing_logs = COALESCE(processing_logs, '') || $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(entry)
        .execute(pool)
        .await
        .context("Failed to append processing log")?;
        Ok(())
    }

    /// Oldest record still in `EM_ABERTO`, if any.
    pub async fn get_pending(pool: &PgPool) -> Result<Option<Analysis>> {
        let row = sqlx::query_as::<_, AnalysisRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM analyses \
             WHERE status = 'EM_ABERTO' ORDER BY created_at ASC LIMIT 1"
        ))
        .fetch_optional(pool)
        .await
        .context("Failed to fetch pending analysis")?;

        row.map(TryInto::try_into).transpose()
    }
}
