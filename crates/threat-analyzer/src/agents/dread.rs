//! DREAD risk scoring stage.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use crate::llm::{run_text_with_fallback, ChatMessage, FallbackFailure, LlmCache, Provider};

const DREAD_SYSTEM_PROMPT: &str = r#"You are an expert security analyst specializing in DREAD risk scoring.

DREAD is a risk assessment model that scores threats on 5 dimensions (each 1-10):

- Damage (D): How much damage could result if the vulnerability is exploited?
- Reproducibility (R): How easy is it to reproduce the attack?
- Exploitability (E): How easy is it to launch an attack?
- Affected Users (A): How many users would be affected?
- Discoverability (D): How easy is it to discover the vulnerability?

Be consistent and realistic in your scoring."#;

const DREAD_USER_PROMPT: &str = r#"Score the following threats using DREAD methodology.

Threats to score:
{threats}

For each threat, return the original threat object with added DREAD scoring:
- dread_score: the average of all 5 DREAD scores (rounded to 2 decimal places)
- dread_details: object with individual scores (damage, reproducibility, exploitability, affected_users, discoverability)

Return ONLY a JSON list with the scored threats."#;

fn validate_dread_result(result: &Value) -> bool {
    result.is_array()
}

pub struct DreadStage {
    providers: Vec<Arc<dyn Provider>>,
    cache: Option<Arc<LlmCache>>,
}

impl DreadStage {
    pub fn new(providers: Vec<Arc<dyn Provider>>, cache: Option<Arc<LlmCache>>) -> Self {
        Self { providers, cache }
    }

    /// Score threats 1-10 on the five DREAD dimensions. Provider exhaustion
    /// returns the input unchanged (threats without scores).
    pub async fn run(&self, threats: Vec<Value>) -> (Vec<Value>, Option<FallbackFailure>) {
        if threats.is_empty() {
            return (threats, None);
        }
        info!("Starting DREAD scoring for {} threats", threats.len());

        let threats_json = serde_json::to_string_pretty(&threats).unwrap_or_default();
        let messages = [
            ChatMessage::system(DREAD_SYSTEM_PROMPT),
            ChatMessage::user(DREAD_USER_PROMPT.replace("{threats}", &threats_json)),
        ];

        let result = run_text_with_fallback(
            &self.providers,
            &messages,
            self.cache.as_deref(),
            "dread",
            validate_dread_result,
        )
        .await;

        match result {
            Ok(Value::Array(scored)) => (clamp_scores(scored), None),
            Ok(_) => (threats, None),
            Err(failure) => {
                error!("DREAD scoring failed: {}", failure.message);
                (threats, Some(failure))
            }
        }
    }
}

/// Clamp every `dread_score` into the closed interval [1, 10].
fn clamp_scores(mut scored: Vec<Value>) -> Vec<Value> {
    for threat in &mut scored {
        let Some(object) = threat.as_object_mut() else {
            continue;
        };
        if let Some(score) = object.get("dread_score").and_then(Value::as_f64) {
            object.insert("dread_score".to_string(), json!(score.clamp(1.0, 10.0)));
        }
    }
    scored
}
