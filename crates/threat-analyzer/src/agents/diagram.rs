//! Diagram analysis stage: vision extraction of components, connections,
//! and trust boundaries.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use crate::llm::{run_vision_with_fallback, FallbackFailure, LlmCache, Provider};

const DIAGRAM_PROMPT: &str = r#"
Analyze this architecture diagram.

1. Identify all components (Users, Servers, Databases, Gateways, Load Balancers, etc.).
2. Identify the connections and data flows between them.
3. Identify trust boundaries (e.g., VPCs, Public/Private subnets, DMZs).

Return ONLY a valid JSON object structured as:
{
  "model": "model_name",
  "components": [{"id": "unique_id", "type": "ComponentType", "name": "Display Name"}],
  "connections": [{"from": "source_id", "to": "target_id", "protocol": "HTTPS/HTTP/TCP/etc"}],
  "boundaries": ["boundary name 1", "boundary name 2"]
}

Important:
- Each component must have a unique id
- Use descriptive component types (User, Server, Database, Gateway, LoadBalancer, Cache, Queue, API, Service)
- Include the communication protocol for each connection when visible
"#;

/// Accept an object with a `components` array and no `error` key.
fn validate_diagram_result(result: &Value) -> bool {
    let Some(object) = result.as_object() else {
        return false;
    };
    if object.contains_key("error") {
        return false;
    }
    match object.get("components") {
        None => true,
        Some(components) => components.is_array(),
    }
}

pub struct DiagramStage {
    providers: Vec<Arc<dyn Provider>>,
    cache: Option<Arc<LlmCache>>,
}

impl DiagramStage {
    pub fn new(providers: Vec<Arc<dyn Provider>>, cache: Option<Arc<LlmCache>>) -> Self {
        Self { providers, cache }
    }

    /// Analyze an architecture diagram image. On provider exhaustion the
    /// stage degrades to the canonical fallback object and hands back the
    /// recorded engine errors.
    pub async fn run(&self, image: &[u8]) -> (Value, Option<FallbackFailure>) {
        info!("Starting diagram analysis");
        let result = run_vision_with_fallback(
            &self.providers,
            DIAGRAM_PROMPT,
            image,
            self.cache.as_deref(),
            "diagram",
            validate_diagram_result,
        )
        .await;

        match result {
            Ok(data) => {
                info!(
                    "Diagram analysis complete: {} components, {} connections",
                    data["components"].as_array().map_or(0, Vec::len),
                    data["connections"].as_array().map_or(0, Vec::len),
                );
                (data, None)
            }
            Err(failure) => {
                error!("Diagram analysis failed: {}", failure.message);
                (fallback_data(), Some(failure))
            }
        }
    }
}

/// Canonical degraded output: one unknown component, nothing else, so later
/// stages can still run.
fn fallback_data() -> Value {
    json!({
        "model": "Fallback/Error",
        "components": [
            {"id": "unknown_1", "type": "Unknown", "name": "Unanalyzed Component"}
        ],
        "connections": [],
        "boundaries": [],
    })
}
