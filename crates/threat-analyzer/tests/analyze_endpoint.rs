//! End-to-end tests for the analyze endpoint with mock providers.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use threat_analyzer::llm::{ChatMessage, LlmCache, LlmErrorKind, LlmFailure, Provider};
use threat_analyzer::rag::{Embeddings, RagService};
use threat_analyzer::routes::{api_router, AppState};
use threat_analyzer::{Settings, ThreatModelService};
use threat_shared::MemoryCacheBackend;

struct NoEmbeddings;

#[async_trait]
impl Embeddings for NoEmbeddings {
    async fn embed(&self, _: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("unavailable")
    }
}

/// Scripted provider: pops one canned result per invocation.
struct ScriptedProvider {
    name: String,
    results: Mutex<std::collections::VecDeque<Result<Value, LlmFailure>>>,
}

impl ScriptedProvider {
    fn new(name: &str, results: Vec<Result<Value, LlmFailure>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            results: Mutex::new(results.into()),
        })
    }

    fn always_failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            results: Mutex::new(std::collections::VecDeque::new()),
        })
    }

    fn next(&self) -> Result<Value, LlmFailure> {
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(LlmFailure::new(
                LlmErrorKind::Processing,
                self.name.clone(),
                "provider unavailable",
            ))
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }
    fn is_configured(&self) -> bool {
        true
    }
    async fn invoke_vision(&self, _: &str, _: &[u8]) -> Result<Value, LlmFailure> {
        self.next()
    }
    async fn invoke_text(&self, _: &[ChatMessage]) -> Result<Value, LlmFailure> {
        self.next()
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::from_env();
    settings.redis_url = None;
    settings.google_api_key = None;
    settings.openai_api_key = None;
    settings.knowledge_base_path = PathBuf::from("/nonexistent/kb");
    settings.max_upload_size_mb = 10;
    settings.allowed_image_types = vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/webp".to_string(),
        "image/gif".to_string(),
    ];
    settings
}

fn app_with_providers(providers: Vec<Arc<dyn Provider>>) -> axum::Router {
    let settings = test_settings();
    let cache = Arc::new(LlmCache::new(Arc::new(MemoryCacheBackend::new())));
    let rag = Arc::new(RagService::with_embeddings(&settings, Arc::new(NoEmbeddings)));
    let service = Arc::new(ThreatModelService::with_parts(providers, cache, rag));
    api_router(AppState {
        settings: Arc::new(settings),
        service,
    })
}

const BOUNDARY: &str = "test-boundary";

fn multipart_upload(content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"diagram.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/v1/threat-model/analyze")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_happy_path_returns_full_report() {
    let provider = ScriptedProvider::new(
        "Gemini",
        vec![
            Ok(json!({"is_architecture_diagram": true, "reason": "ok"})),
            Ok(json!({
                "model": "gemini-1.5-pro",
                "components": [{"id": "c1", "type": "Server", "name": "Web"}],
                "connections": [],
                "boundaries": [],
            })),
            Ok(json!([{
                "component_id": "c1",
                "threat_type": "Spoofing",
                "description": "d",
                "mitigation": "m",
            }])),
            Ok(json!([{
                "component_id": "c1",
                "threat_type": "Spoofing",
                "description": "d",
                "mitigation": "m",
                "dread_score": 7.2,
            }])),
        ],
    );
    let app = app_with_providers(vec![provider]);

    let (status, body) = send(app, multipart_upload("image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_used"], "gemini-1.5-pro");
    assert_eq!(body["threats"][0]["component_id"], "c1");
    assert_eq!(body["threats"][0]["dread_score"], json!(7.2));
    assert_eq!(body["risk_level"], "HIGH");
    assert_eq!(body["threat_count"], 1);
}

#[tokio::test]
async fn test_invalid_content_type_rejected() {
    let app = app_with_providers(vec![ScriptedProvider::always_failing("Gemini")]);
    let (status, body) = send(app, multipart_upload("application/pdf", b"%PDF")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Invalid file type: application/pdf"));
}

#[tokio::test]
async fn test_empty_body_rejected() {
    let app = app_with_providers(vec![ScriptedProvider::always_failing("Gemini")]);
    let (status, body) = send(app, multipart_upload("image/png", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Empty image content");
}

#[tokio::test]
async fn test_oversize_upload_rejected() {
    let app = app_with_providers(vec![ScriptedProvider::always_failing("Gemini")]);
    let oversized = vec![0u8; 11 * 1024 * 1024];
    let (status, body) = send(app, multipart_upload("image/png", &oversized)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("File too large"));
}

#[tokio::test]
async fn test_guardrail_rejection_is_400_with_reason() {
    let provider = ScriptedProvider::new(
        "Gemini",
        vec![Ok(
            json!({"is_architecture_diagram": false, "reason": "sequence diagram"}),
        )],
    );
    let app = app_with_providers(vec![provider]);

    let (status, body) = send(app, multipart_upload("image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Imagem não é um diagrama de arquitetura válido:"));
}

#[tokio::test]
async fn test_all_providers_failing_is_500_with_engine_errors() {
    let gemini = ScriptedProvider::always_failing("Gemini");
    let openai = ScriptedProvider::always_failing("OpenAI");
    let app = app_with_providers(vec![gemini, openai]);

    let (status, body) = send(app, multipart_upload("image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "All LLM providers failed");
    let engines: Vec<&str> = body["engine_errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["engine"].as_str().unwrap())
        .collect();
    assert_eq!(engines, vec!["Gemini", "OpenAI"]);
}
