//! Analysis entity: an uploaded diagram image and its processing result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Analysis processing status. The wire strings are the original system's
/// stored values; the closed enum makes impossible transitions
/// unrepresentable in application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    #[serde(rename = "EM_ABERTO")]
    EmAberto,
    #[serde(rename = "PROCESSANDO")]
    Processando,
    #[serde(rename = "ANALISADO")]
    Analisado,
    #[serde(rename = "FALHOU")]
    Falhou,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::EmAberto => "EM_ABERTO",
            AnalysisStatus::Processando => "PROCESSANDO",
            AnalysisStatus::Analisado => "ANALISADO",
            AnalysisStatus::Falhou => "FALHOU",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Analisado | AnalysisStatus::Falhou)
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EM_ABERTO" => Ok(AnalysisStatus::EmAberto),
            "PROCESSANDO" => Ok(AnalysisStatus::Processando),
            "ANALISADO" => Ok(AnalysisStatus::Analisado),
            "FALHOU" => Ok(AnalysisStatus::Falhou),
            other => Err(format!("unknown analysis status: {other}")),
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis entity - image upload and processing result.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub id: Uuid,
    /// Human-readable monotonic code, e.g. `TMA-001`.
    pub code: String,
    /// Relative path of the stored image in the blob store.
    pub image_path: String,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Structured report, present iff status is `ANALISADO`.
    pub result: Option<Value>,
    pub processing_logs: Option<String>,
    /// Non-empty iff status is `FALHOU`.
    pub error_message: Option<String>,
}

impl Analysis {
    pub fn is_open(&self) -> bool {
        self.status == AnalysisStatus::EmAberto
    }

    pub fn is_processing(&self) -> bool {
        self.status == AnalysisStatus::Processando
    }

    pub fn is_done(&self) -> bool {
        self.status == AnalysisStatus::Analisado
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnalysisStatus::Falhou
    }
}
