//! Per-job processing: drive one claimed analysis through the analyzer,
//! record the terminal transition, and emit the completion notification.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notification::NotificationRepository;

use super::analyzer_client::{content_type_for_path, AnalyzerClient};
use super::repository::AnalysisRepository;
use super::storage::ImageStorage;

/// Outcome report for one processing attempt.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The record does not exist.
    NotFound,
    /// The record was already terminal, or another worker holds the claim.
    Skipped,
    /// The job transitioned to `FALHOU`.
    Failed { error: String },
    /// The job transitioned to `ANALISADO`.
    Completed {
        threat_count: usize,
        risk_level: String,
    },
    /// A store failure prevented any state change.
    StoreError(String),
}

/// Orchestrates analysis processing: analyzer call, status updates,
/// notification.
pub struct ProcessingService {
    pool: PgPool,
    storage: ImageStorage,
    client: AnalyzerClient,
}

impl ProcessingService {
    pub fn new(pool: PgPool, storage: ImageStorage, client: AnalyzerClient) -> Self {
        Self {
            pool,
            storage,
            client,
        }
    }

    /// Process a single analysis. Every step appends a timestamped line to
    /// the job's processing log.
    pub async fn process(&self, analysis_id: Uuid) -> ProcessOutcome {
        let analysis = match AnalysisRepository::get_by_id(&self.pool, analysis_id).await {
            Ok(Some(analysis)) => analysis,
            Ok(None) => {
                warn!("Analysis {} not found", analysis_id);
                return ProcessOutcome::NotFound;
            }
            Err(e) => return ProcessOutcome::StoreError(e.to_string()),
        };

        if analysis.is_done() || analysis.is_failed() {
            info!("Analysis {} already finished, skipping", analysis.code);
            return ProcessOutcome::Skipped;
        }

        // Race path: the scheduler usually claims before enqueueing, but a
        // still-open record must be claimed here. Losing the claim means
        // another worker owns the job.
        if analysis.is_open() {
            match AnalysisRepository::mark_processing(&self.pool, analysis_id, Utc::now()).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Analysis {} claimed by another worker, skipping", analysis.code);
                    return ProcessOutcome::Skipped;
                }
                Err(e) => return ProcessOutcome::StoreError(e.to_string()),
            }
        }

        self.append_log(analysis_id, "Processamento iniciado").await;

        let image = match self.load_image(&analysis.image_path).await {
            Some(image) => image,
            None => {
                return self
                    .fail(analysis_id, "Image file not found".to_string())
                    .await;
            }
        };

        self.append_log(
            analysis_id,
            &format!("Chamando threat-analyzer em {}", self.client.analyze_endpoint()),
        )
        .await;

        let full_path = self.storage.full_path(&analysis.image_path);
        let content_type = content_type_for_path(&full_path);
        let result = match self
            .client
            .analyze(image, &analysis.image_path, content_type)
            .await
        {
            Ok(result) => result,
            Err(e) => return self.fail(analysis_id, e.to_string()).await,
        };

        let (threat_count, risk_level) = result_summary(&result);

        self.append_log(
            analysis_id,
            &format!("Análise concluída: {threat_count} ameaças"),
        )
        .await;

        match AnalysisRepository::mark_analysed(&self.pool, analysis_id, Utc::now(), &result).await
        {
            Ok(true) => {}
            Ok(false) => {
                // Another writer already sealed the record.
                warn!("Analysis {} no longer processing, skipping finish", analysis.code);
                return ProcessOutcome::Skipped;
            }
            Err(e) => return ProcessOutcome::StoreError(e.to_string()),
        }

        self.notify_completion(analysis_id, &analysis.code, &risk_level, threat_count)
            .await;

        info!(
            "Analysis {} completed: {} threats, risk {}",
            analysis.code, threat_count, risk_level
        );
        ProcessOutcome::Completed {
            threat_count,
            risk_level,
        }
    }

    async fn load_image(&self, image_path: &str) -> Option<Vec<u8>> {
        match self.storage.read(image_path).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => None,
            Err(e) => {
                error!("Image read failed for {}: {}", image_path, e);
                None
            }
        }
    }

    async fn fail(&self, analysis_id: Uuid, error_message: String) -> ProcessOutcome {
        error!("Analysis {} failed: {}", analysis_id, error_message);
        self.append_log(analysis_id, &error_message).await;
        if let Err(e) =
            AnalysisRepository::mark_failed(&self.pool, analysis_id, Utc::now(), &error_message)
                .await
        {
            return ProcessOutcome::StoreError(e.to_string());
        }
        ProcessOutcome::Failed {
            error: error_message,
        }
    }

    async fn notify_completion(
        &self,
        analysis_id: Uuid,
        code: &str,
        risk_level: &str,
        threat_count: usize,
    ) {
        let message = completion_message(code, risk_level, threat_count);
        let link = format!("/analyses/{analysis_id}");
        if let Err(e) = NotificationRepository::create(
            &self.pool,
            analysis_id,
            "Análise Concluída",
            &message,
            &link,
        )
        .await
        {
            // Notification delivery is best-effort; the terminal transition
            // already happened.
            warn!("Notification creation failed for {}: {}", analysis_id, e);
        }
    }

    async fn append_log(&self, analysis_id: Uuid, line: &str) {
        if let Err(e) = AnalysisRepository::append_processing_log(&self.pool, analysis_id, line).await
        {
            warn!("Log append failed for {}: {}", analysis_id, e);
        }
    }
}

/// User-visible completion summary line.
pub fn completion_message(code: &str, risk_level: &str, threat_count: usize) -> String {
    format!("Análise {code} concluída. Risco: {risk_level}. {threat_count} ameaças identificadas.")
}

/// Threat count and risk level summaries read from a stored result.
pub fn result_summary(result: &Value) -> (usize, String) {
    let threat_count = result["threats"].as_array().map_or(0, Vec::len);
    let risk_level = result["risk_level"].as_str().unwrap_or("N/A").to_string();
    (threat_count, risk_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_message_format() {
        let message = completion_message("TMA-001", "HIGH", 1);
        assert_eq!(
            message,
            "Análise TMA-001 concluída. Risco: HIGH. 1 ameaças identificadas."
        );
        assert!(message.contains("Risco: HIGH. 1 ameaças"));
    }

    #[test]
    fn test_result_summary() {
        let result = json!({
            "threats": [{"component_id": "c1"}, {"component_id": "c2"}],
            "risk_level": "MEDIUM",
        });
        assert_eq!(result_summary(&result), (2, "MEDIUM".to_string()));
        assert_eq!(result_summary(&json!({})), (0, "N/A".to_string()));
    }
}
