//! Request/response payloads for the analyses endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{Analysis, AnalysisStatus};

/// Query parameters for the listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub code: Option<String>,
    pub status: Option<String>,
    pub created_at_from: Option<NaiveDate>,
    pub created_at_to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Response when creating a new analysis.
#[derive(Debug, Serialize)]
pub struct AnalysisCreateResponse {
    pub id: String,
    pub code: String,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
}

/// Analysis item in list view, with result summaries when available.
#[derive(Debug, Serialize)]
pub struct AnalysisListItem {
    pub id: String,
    pub code: String,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_count: Option<usize>,
}

/// Paginated listing envelope.
#[derive(Debug, Serialize)]
pub struct AnalysisPage {
    pub items: Vec<AnalysisListItem>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

/// Full analysis detail including the result when `ANALISADO`.
#[derive(Debug, Serialize)]
pub struct AnalysisDetailResponse {
    pub id: String,
    pub code: String,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub image_url: String,
    pub processing_logs: Option<String>,
    pub error_message: Option<String>,
    pub result: Option<Value>,
}

/// Logs payload.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: String,
}

pub fn image_url_for(id: &uuid::Uuid) -> String {
    format!("/api/v1/analyses/{id}/image")
}

impl AnalysisCreateResponse {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        Self {
            id: analysis.id.to_string(),
            code: analysis.code.clone(),
            status: analysis.status,
            created_at: analysis.created_at,
            image_url: image_url_for(&analysis.id),
        }
    }
}

impl AnalysisListItem {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        let result = analysis.result.as_ref();
        Self {
            id: analysis.id.to_string(),
            code: analysis.code.clone(),
            status: analysis.status,
            created_at: analysis.created_at,
            image_url: image_url_for(&analysis.id),
            risk_level: result
                .and_then(|r| r["risk_level"].as_str())
                .map(str::to_string),
            risk_score: result.and_then(|r| r["risk_score"].as_f64()),
            threat_count: result
                .and_then(|r| r["threats"].as_array())
                .map(Vec::len),
        }
    }
}

impl AnalysisDetailResponse {
    pub fn from_analysis(analysis: Analysis) -> Self {
        Self {
            id: analysis.id.to_string(),
            code: analysis.code,
            status: analysis.status,
            created_at: analysis.created_at,
            started_at: analysis.started_at,
            finished_at: analysis.finished_at,
            image_url: image_url_for(&analysis.id),
            processing_logs: analysis.processing_logs,
            error_message: analysis.error_message,
            result: analysis.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn analysis_with_result(result: Option<Value>) -> Analysis {
        Analysis {
            id: Uuid::new_v4(),
            code: "TMA-001".to_string(),
            image_path: "x.png".to_string(),
            status: AnalysisStatus::Analisado,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result,
            processing_logs: None,
            error_message: None,
        }
    }

    #[test]
    fn test_list_item_summaries_from_result() {
        let analysis = analysis_with_result(Some(json!({
            "risk_level": "HIGH",
            "risk_score": 7.2,
            "threats": [{"component_id": "c1"}],
        })));
        let item = AnalysisListItem::from_analysis(&analysis);
        assert_eq!(item.risk_level.as_deref(), Some("HIGH"));
        assert_eq!(item.risk_score, Some(7.2));
        assert_eq!(item.threat_count, Some(1));
        assert!(item.image_url.contains("/image"));
    }

    #[test]
    fn test_list_item_without_result() {
        let item = AnalysisListItem::from_analysis(&analysis_with_result(None));
        assert_eq!(item.risk_level, None);
        assert_eq!(item.threat_count, None);
    }

    #[test]
    fn test_create_response_shape() {
        let analysis = analysis_with_result(None);
        let response = AnalysisCreateResponse::from_analysis(&analysis);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["code"], "TMA-001");
        assert_eq!(value["status"], "ANALISADO");
        assert_eq!(
            value["image_url"],
            format!("/api/v1/analyses/{}/image", analysis.id)
        );
    }
}
