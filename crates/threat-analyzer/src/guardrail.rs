//! Guardrail: reject images that are not architecture diagrams before the
//! full pipeline runs. Never cached; fails open when every provider is down.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::AnalyzerError;
use crate::llm::{run_vision_with_fallback, Provider};

const GUARDRAIL_PROMPT: &str = r#"Analyze this image and determine if it is an architecture diagram.

An architecture diagram shows:
- System components (Users, Servers, Databases, Gateways, Load Balancers, APIs, etc.)
- Connections and data flows between components
- Trust boundaries (VPCs, networks, subnets)

NOT valid architecture diagrams:
- Sequence diagrams (UML with actors and messages over time)
- Photos or screenshots of real environments
- Flowcharts or process diagrams
- Generic illustrations or clipart
- Plain text or documents

Return ONLY a valid JSON object:
{"is_architecture_diagram": true/false, "reason": "brief explanation in one sentence"}

Examples:
- Valid: {"is_architecture_diagram": true, "reason": "Diagram shows web server, database, and load balancer with connections"}
- Invalid: {"is_architecture_diagram": false, "reason": "This is a UML sequence diagram showing message flows, not architecture components"}
"#;

fn validate_guardrail_result(result: &Value) -> bool {
    let Some(object) = result.as_object() else {
        return false;
    };
    !object.contains_key("error") && object.contains_key("is_architecture_diagram")
}

/// Accepts boolean `true` and the string variants models sometimes emit.
fn is_affirmative(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Classify the image; reject with a tagged error when it is not an
/// architecture diagram. A fully failed classification passes through so
/// the pipeline still attempts the analysis.
pub async fn validate_architecture_diagram(
    providers: &[Arc<dyn Provider>],
    image: &[u8],
) -> Result<(), AnalyzerError> {
    info!("Guardrail: validating image is architecture diagram");

    let result = run_vision_with_fallback(
        providers,
        GUARDRAIL_PROMPT,
        image,
        None,
        "guardrail",
        validate_guardrail_result,
    )
    .await;

    let result = match result {
        Ok(value) => value,
        Err(failure) => {
            warn!(
                "Guardrail: LLM validation failed, allowing through: {}",
                failure.message
            );
            return Ok(());
        }
    };

    let is_valid = is_affirmative(&result["is_architecture_diagram"]);
    let reason = result["reason"]
        .as_str()
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason provided")
        .to_string();

    if !is_valid {
        warn!("Guardrail: image rejected - {}", reason);
        return Err(AnalyzerError::GuardrailRejected {
            reason: format!("Imagem não é um diagrama de arquitetura válido: {reason}"),
        });
    }

    info!("Guardrail: image validated as architecture diagram");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, LlmErrorKind, LlmFailure};
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticProvider(Result<Value, LlmFailure>);

    #[async_trait]
    impl Provider for StaticProvider {
        fn name(&self) -> &str {
            "Static"
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn invoke_vision(&self, _: &str, _: &[u8]) -> Result<Value, LlmFailure> {
            self.0.clone()
        }
        async fn invoke_text(&self, _: &[ChatMessage]) -> Result<Value, LlmFailure> {
            self.0.clone()
        }
    }

    fn providers_with(result: Result<Value, LlmFailure>) -> Vec<Arc<dyn Provider>> {
        vec![Arc::new(StaticProvider(result))]
    }

    #[tokio::test]
    async fn test_valid_diagram_accepted() {
        let providers = providers_with(Ok(
            json!({"is_architecture_diagram": true, "reason": "servers and databases"}),
        ));
        assert!(validate_architecture_diagram(&providers, b"img").await.is_ok());
    }

    #[tokio::test]
    async fn test_boolean_as_string_accepted() {
        let providers =
            providers_with(Ok(json!({"is_architecture_diagram": "True", "reason": "ok"})));
        assert!(validate_architecture_diagram(&providers, b"img").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejection_carries_reason() {
        let providers = providers_with(Ok(
            json!({"is_architecture_diagram": false, "reason": "sequence diagram"}),
        ));
        let err = validate_architecture_diagram(&providers, b"img")
            .await
            .unwrap_err();
        match err {
            AnalyzerError::GuardrailRejected { reason } => {
                assert_eq!(
                    reason,
                    "Imagem não é um diagrama de arquitetura válido: sequence diagram"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_total_failure_passes_through() {
        let providers = providers_with(Err(LlmFailure::new(
            LlmErrorKind::Processing,
            "Static",
            "down",
        )));
        assert!(validate_architecture_diagram(&providers, b"img").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_flag_fails_validator_then_passes_through() {
        // A result without the expected key is rejected by the validator,
        // exhausting the chain; the guardrail then fails open.
        let providers = providers_with(Ok(json!({"reason": "no flag"})));
        assert!(validate_architecture_diagram(&providers, b"img").await.is_ok());
    }
}
