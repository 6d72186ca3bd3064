//! STRIDE threat identification stage, seeded with retrieval context.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::llm::{run_text_with_fallback, ChatMessage, FallbackFailure, LlmCache, Provider};
use crate::rag::RagService;

const STRIDE_SYSTEM_PROMPT: &str = r#"You are an expert security analyst specializing in STRIDE threat modeling.

STRIDE Categories:
- Spoofing: Pretending to be someone or something else
- Tampering: Modifying data or code without authorization
- Repudiation: Denying having performed an action
- Information Disclosure: Exposing information to unauthorized parties
- Denial of Service: Making a system unavailable
- Elevation of Privilege: Gaining unauthorized access or capabilities

For each component and connection in the architecture, identify potential threats and provide actionable mitigations.

{context}"#;

const STRIDE_USER_PROMPT: &str = r#"Based on this architecture diagram analysis:

Components:
{components}

Connections:
{connections}

Trust Boundaries:
{boundaries}

Identify all STRIDE threats. Return a JSON list of threat objects:
[
  {
    "component_id": "affected_component_id",
    "threat_type": "Spoofing|Tampering|Repudiation|Information Disclosure|Denial of Service|Elevation of Privilege",
    "description": "Clear description of the threat",
    "mitigation": "Specific actionable mitigation"
  }
]

Be thorough - analyze each component and connection for potential threats.
Return ONLY the JSON list, no additional text."#;

/// Fixed seed query for generic STRIDE guidance from the knowledge base.
const RAG_SEED_QUERY: &str =
    "What are typical STRIDE threats for web applications and microservices?";

fn validate_stride_result(result: &Value) -> bool {
    result.is_array()
}

pub struct StrideStage {
    providers: Vec<Arc<dyn Provider>>,
    cache: Option<Arc<LlmCache>>,
    rag: Arc<RagService>,
}

impl StrideStage {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        cache: Option<Arc<LlmCache>>,
        rag: Arc<RagService>,
    ) -> Self {
        Self {
            providers,
            cache,
            rag,
        }
    }

    /// Identify STRIDE threats for the extracted diagram. Provider
    /// exhaustion degrades to an empty list (a legitimate outcome).
    pub async fn run(&self, diagram_data: &Value) -> (Vec<Value>, Option<FallbackFailure>) {
        info!("Starting STRIDE analysis");

        let chunks = self.rag.query(RAG_SEED_QUERY, 3).await;
        let context = if chunks.is_empty() {
            String::new()
        } else {
            format!("\n\nRelevant context:\n{}", chunks.join("\n"))
        };

        let system_content = STRIDE_SYSTEM_PROMPT.replace("{context}", &context);
        let user_content = STRIDE_USER_PROMPT
            .replace("{components}", &format_components(diagram_data))
            .replace("{connections}", &format_connections(diagram_data))
            .replace("{boundaries}", &format_boundaries(diagram_data));

        let messages = [
            ChatMessage::system(system_content),
            ChatMessage::user(user_content),
        ];

        let result = run_text_with_fallback(
            &self.providers,
            &messages,
            self.cache.as_deref(),
            "stride",
            validate_stride_result,
        )
        .await;

        match result {
            Ok(Value::Array(threats)) => {
                info!("STRIDE analysis complete: {} threats", threats.len());
                (threats, None)
            }
            Ok(_) => (Vec::new(), None),
            Err(failure) => {
                error!("STRIDE analysis failed: {}", failure.message);
                (Vec::new(), Some(failure))
            }
        }
    }
}

fn format_components(diagram_data: &Value) -> String {
    let Some(components) = diagram_data["components"].as_array().filter(|c| !c.is_empty())
    else {
        return "None identified".to_string();
    };
    components
        .iter()
        .map(|c| {
            format!(
                "- [{}] {}: {}",
                c["id"].as_str().unwrap_or("unknown"),
                c["type"].as_str().unwrap_or("Unknown"),
                c["name"].as_str().unwrap_or("Unnamed"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_connections(diagram_data: &Value) -> String {
    let Some(connections) = diagram_data["connections"]
        .as_array()
        .filter(|c| !c.is_empty())
    else {
        return "None identified".to_string();
    };
    connections
        .iter()
        .map(|c| {
            format!(
                "- {} -> {} ({})",
                c["from"].as_str().unwrap_or("unknown"),
                c["to"].as_str().unwrap_or("unknown"),
                c["protocol"].as_str().unwrap_or("unknown"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_boundaries(diagram_data: &Value) -> String {
    let names: Vec<&str> = diagram_data["boundaries"]
        .as_array()
        .map(|b| b.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if names.is_empty() {
        "None identified".to_string()
    } else {
        names.join(", ")
    }
}
