//! Threat analysis engine.
//!
//! Turns an uploaded architecture-diagram image into a STRIDE/DREAD threat
//! report by chaining three LLM stages (Diagram -> STRIDE -> DREAD) behind
//! an image-validity guardrail. Every inference call goes through an
//! ordered provider fallback chain with a two-tier response cache, and the
//! STRIDE stage pulls context from a lazily built retrieval index.

pub mod agents;
pub mod config;
pub mod error;
pub mod guardrail;
pub mod llm;
pub mod rag;
pub mod routes;
pub mod schemas;
pub mod service;

pub use config::Settings;
pub use error::AnalyzerError;
pub use service::ThreatModelService;
