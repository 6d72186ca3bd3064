//! Periodic scan-and-claim scheduling plus the worker loop.
//!
//! One tick per interval: read the oldest pending analysis, attempt the
//! single-row claim, and hand at most one job id to the worker channel.
//! The cadence and the one-job-per-tick policy are the admission control.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::processing::ProcessingService;
use super::repository::AnalysisRepository;

/// One scheduler tick. Returns the claimed job id, or `None` when there is
/// no pending work or another writer won the claim.
pub async fn scan_once(pool: &PgPool, tx: &mpsc::Sender<Uuid>) -> Result<Option<Uuid>> {
    let Some(analysis) = AnalysisRepository::get_pending(pool).await? else {
        debug!("Scheduler: no pending analyses");
        return Ok(None);
    };

    if !AnalysisRepository::mark_processing(pool, analysis.id, Utc::now()).await? {
        // Another worker won the race for this record; skip the tick.
        debug!("Scheduler: claim lost for {}", analysis.code);
        return Ok(None);
    }

    info!("Scheduler: claimed {} ({})", analysis.code, analysis.id);
    if tx.send(analysis.id).await.is_err() {
        warn!("Scheduler: worker channel closed");
        return Ok(None);
    }
    Ok(Some(analysis.id))
}

/// Fixed-cadence scan loop. Never processes more than one job per tick.
pub async fn scheduler_loop(pool: PgPool, tx: mpsc::Sender<Uuid>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Err(e) = scan_once(&pool, &tx).await {
            error!("Scheduler tick failed: {}", e);
        }
    }
}

/// Drains claimed job ids and drives each through the processing service.
pub async fn worker_loop(mut rx: mpsc::Receiver<Uuid>, processing: Arc<ProcessingService>) {
    while let Some(analysis_id) = rx.recv().await {
        let outcome = processing.process(analysis_id).await;
        debug!("Worker: {} -> {:?}", analysis_id, outcome);
    }
    info!("Worker: channel closed, stopping");
}
