//! Shared application state for the orchestrator HTTP surface.

use std::sync::Arc;

use sqlx::PgPool;

use crate::analysis::ImageStorage;
use crate::config::Settings;

#[derive(Clone)]
pub struct OrchestratorState {
    pub pool: PgPool,
    pub storage: ImageStorage,
    pub settings: Arc<Settings>,
}
