//! Pipeline orchestration: guardrail -> diagram -> STRIDE -> DREAD ->
//! aggregation into the response schema.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use crate::agents::{DiagramStage, DreadStage, StrideStage};
use crate::config::Settings;
use crate::error::AnalyzerError;
use crate::guardrail::validate_architecture_diagram;
use crate::llm::{default_providers, LlmCache, Provider};
use crate::rag::RagService;
use crate::schemas::{
    round2, AnalysisResponse, Component, Connection, DreadScore, RiskLevel, Threat,
};
use threat_shared::get_cache_backend;

/// Service driving the full threat analysis for one request.
pub struct ThreatModelService {
    providers: Vec<Arc<dyn Provider>>,
    diagram: DiagramStage,
    stride: StrideStage,
    dread: DreadStage,
}

impl ThreatModelService {
    pub fn new(settings: &Settings) -> Self {
        let providers = default_providers(settings);
        let backend = get_cache_backend(settings.redis_url.as_deref());
        let cache = Arc::new(LlmCache::new(backend));
        let rag = Arc::new(RagService::new(settings));
        Self::with_parts(providers, cache, rag)
    }

    /// Assemble from explicit parts; tests inject mock providers here.
    pub fn with_parts(
        providers: Vec<Arc<dyn Provider>>,
        cache: Arc<LlmCache>,
        rag: Arc<RagService>,
    ) -> Self {
        let diagram = DiagramStage::new(providers.clone(), Some(cache.clone()));
        let stride = StrideStage::new(providers.clone(), Some(cache.clone()), rag);
        let dread = DreadStage::new(providers.clone(), Some(cache));
        Self {
            providers,
            diagram,
            stride,
            dread,
        }
    }

    /// Run the complete pipeline. Stages execute strictly in order; each
    /// degrades on its own, but when the diagram and STRIDE runners both
    /// exhaust every provider the analysis cannot proceed at all and the
    /// aggregated engine errors surface as a 500.
    pub async fn run_full_analysis(&self, image: &[u8]) -> Result<AnalysisResponse, AnalyzerError> {
        let start = Instant::now();

        validate_architecture_diagram(&self.providers, image).await?;

        info!("Stage 1: Diagram Analysis");
        let (diagram_data, diagram_failure) = self.diagram.run(image).await;

        info!("Stage 2: STRIDE Analysis");
        let (threats, stride_failure) = self.stride.run(&diagram_data).await;

        if let (Some(diagram_failure), Some(_)) = (&diagram_failure, &stride_failure) {
            return Err(AnalyzerError::AllProvidersFailed {
                engine_errors: diagram_failure.engine_errors.clone(),
            });
        }

        info!("Stage 3: DREAD Scoring");
        let (scored_threats, _) = self.dread.run(threats).await;

        let parsed_threats = parse_threats(&scored_threats);
        let risk_score = round2(calculate_risk_score(&parsed_threats));
        let risk_level = RiskLevel::from_score(risk_score);
        let processing_time = round2(start.elapsed().as_secs_f64());

        let components = parse_components(&diagram_data);
        let connections = parse_connections(&diagram_data);
        let trust_boundaries = parse_boundaries(&diagram_data);

        info!(
            "Analysis complete: {} components, {} threats, risk={} ({:.2}) in {:.2}s",
            components.len(),
            parsed_threats.len(),
            risk_level.as_str(),
            risk_score,
            processing_time,
        );

        Ok(AnalysisResponse {
            model_used: diagram_data["model"].as_str().unwrap_or("Unknown").to_string(),
            threat_count: parsed_threats.len(),
            component_count: components.len(),
            components,
            connections,
            trust_boundaries,
            threats: parsed_threats,
            risk_score,
            risk_level,
            processing_time,
        })
    }
}

/// Mean of the non-null dread scores; 0 when none are present.
fn calculate_risk_score(threats: &[Threat]) -> f64 {
    let scores: Vec<f64> = threats.iter().filter_map(|t| t.dread_score).collect();
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn parse_components(diagram_data: &Value) -> Vec<Component> {
    let Some(raw) = diagram_data["components"].as_array() else {
        return Vec::new();
    };
    raw.iter()
        .map(|c| Component {
            id: c["id"].as_str().unwrap_or("unknown").to_string(),
            component_type: c["type"].as_str().unwrap_or("Unknown").to_string(),
            name: c["name"].as_str().unwrap_or("Unnamed").to_string(),
            description: c["description"].as_str().map(str::to_string),
        })
        .collect()
}

fn parse_connections(diagram_data: &Value) -> Vec<Connection> {
    let Some(raw) = diagram_data["connections"].as_array() else {
        return Vec::new();
    };
    raw.iter()
        .map(|c| Connection {
            from_id: c["from"].as_str().unwrap_or("unknown").to_string(),
            to_id: c["to"].as_str().unwrap_or("unknown").to_string(),
            protocol: c["protocol"].as_str().map(str::to_string),
            description: c["description"].as_str().map(str::to_string),
            encrypted: c["encrypted"].as_bool(),
        })
        .collect()
}

fn parse_boundaries(diagram_data: &Value) -> Vec<String> {
    diagram_data["boundaries"]
        .as_array()
        .map(|b| b.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Parse raw threat dictionaries into schema structs; items that fail
/// validation are logged and dropped, never abort the analysis.
fn parse_threats(raw_threats: &[Value]) -> Vec<Threat> {
    let mut parsed = Vec::with_capacity(raw_threats.len());
    for raw in raw_threats {
        match parse_threat(raw) {
            Ok(threat) => parsed.push(threat),
            Err(reason) => warn!("Failed to parse threat: {}", reason),
        }
    }
    parsed
}

fn parse_threat(raw: &Value) -> Result<Threat, String> {
    let threat_type = serde_json::from_value(raw["threat_type"].clone())
        .map_err(|_| format!("unknown threat_type {}", raw["threat_type"]))?;

    let dread_details: Option<DreadScore> = match raw.get("dread_details") {
        None | Some(Value::Null) => None,
        Some(details) => {
            let details: DreadScore = serde_json::from_value(details.clone())
                .map_err(|e| format!("invalid dread_details: {e}"))?;
            if !details.is_valid() {
                return Err("dread_details dimensions out of [1, 10]".to_string());
            }
            Some(details)
        }
    };

    let dread_score = raw["dread_score"]
        .as_f64()
        .map(|score| round2(score.clamp(1.0, 10.0)));

    Ok(Threat {
        component_id: raw["component_id"].as_str().unwrap_or("unknown").to_string(),
        threat_type,
        description: raw["description"]
            .as_str()
            .unwrap_or("No description")
            .to_string(),
        mitigation: raw["mitigation"]
            .as_str()
            .unwrap_or("No mitigation provided")
            .to_string(),
        dread_score,
        dread_details,
    })
}
