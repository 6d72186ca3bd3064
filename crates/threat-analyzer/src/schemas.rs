//! Threat report schema: components, connections, STRIDE threats, DREAD
//! scores, and the aggregated analysis response.

use serde::{Deserialize, Serialize};

/// STRIDE threat categories (Microsoft threat modelling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrideCategory {
    Spoofing,
    Tampering,
    Repudiation,
    #[serde(rename = "Information Disclosure", alias = "InformationDisclosure")]
    InformationDisclosure,
    #[serde(rename = "Denial of Service", alias = "DenialOfService")]
    DenialOfService,
    #[serde(rename = "Elevation of Privilege", alias = "ElevationOfPrivilege")]
    ElevationOfPrivilege,
}

/// Per-threat DREAD scoring: five dimensions, each an integer 1-10.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreadScore {
    pub damage: u8,
    pub reproducibility: u8,
    pub exploitability: u8,
    pub affected_users: u8,
    pub discoverability: u8,
}

impl DreadScore {
    /// All five dimensions within the closed interval [1, 10].
    pub fn is_valid(&self) -> bool {
        [
            self.damage,
            self.reproducibility,
            self.exploitability,
            self.affected_users,
            self.discoverability,
        ]
        .iter()
        .all(|d| (1..=10).contains(d))
    }

    /// Arithmetic mean of the five dimensions.
    pub fn average(&self) -> f64 {
        f64::from(
            u32::from(self.damage)
                + u32::from(self.reproducibility)
                + u32::from(self.exploitability)
                + u32::from(self.affected_users)
                + u32::from(self.discoverability),
        ) / 5.0
    }
}

/// A single identified threat, linked to a component by `component_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub component_id: String,
    pub threat_type: StrideCategory,
    pub description: String,
    pub mitigation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dread_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dread_details: Option<DreadScore>,
}

/// A component in the architecture diagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A connection between two components. The diagram stage emits `from`/`to`;
/// responses carry `from_id`/`to_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    #[serde(alias = "from")]
    pub from_id: String,
    #[serde(alias = "to")]
    pub to_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
}

/// Risk level classification derived from the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Piecewise bucketing: <3 Low, <6 Medium, <8 High, else Critical.
    pub fn from_score(score: f64) -> Self {
        if score < 3.0 {
            RiskLevel::Low
        } else if score < 6.0 {
            RiskLevel::Medium
        } else if score < 8.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

/// Complete threat analysis response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub model_used: String,
    pub components: Vec<Component>,
    pub connections: Vec<Connection>,
    pub trust_boundaries: Vec<String>,
    pub threats: Vec<Threat>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub processing_time: f64,
    pub threat_count: usize,
    pub component_count: usize,
}

/// Round to two decimal places (scores and timings on the wire).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
