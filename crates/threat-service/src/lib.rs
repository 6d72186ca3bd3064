//! Threat modeling orchestrator.
//!
//! Persists analysis jobs, schedules background processing (a once-per-
//! minute scan with a single-row claim), drives claimed jobs through the
//! analyzer service, and emits notifications on completion.

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod notification;
pub mod state;

pub use config::Settings;
pub use error::ServiceError;
pub use state::OrchestratorState;
