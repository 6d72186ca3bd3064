//! Embedding client seam for the retrieval index.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Text embedding capability. The index only needs batch embedding; the
/// same call covers both corpus chunks and queries.
#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BATCH_SIZE: usize = 100;

/// Gemini embeddings (`batchEmbedContents`).
pub struct GeminiEmbeddings {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbedValues>,
}

#[derive(Deserialize)]
struct EmbedValues {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbeddings {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_key: settings.google_api_key.clone(),
            model: settings.embedding_model.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Embeddings for GeminiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GOOGLE_API_KEY not configured for embeddings"))?;
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };

        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedRequest {
                        model: model.clone(),
                        content: EmbedContent {
                            parts: vec![EmbedPart { text: text.clone() }],
                        },
                    })
                    .collect(),
            };
            let response = self
                .client
                .post(format!(
                    "{}/{}:batchEmbedContents?key={}",
                    self.base_url, model, api_key
                ))
                .json(&request)
                .send()
                .await
                .context("Embedding request failed")?;

            let status = response.status();
            let body = response.text().await.context("Embedding response read failed")?;
            if !status.is_success() {
                let detail: String = body.chars().take(500).collect();
                return Err(anyhow!(
                    "Embedding request failed: HTTP {}: {}",
                    status.as_u16(),
                    detail
                ));
            }
            let parsed: BatchEmbedResponse =
                serde_json::from_str(&body).context("Malformed embedding response")?;
            if parsed.embeddings.len() != batch.len() {
                return Err(anyhow!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    parsed.embeddings.len()
                ));
            }
            all.extend(parsed.embeddings.into_iter().map(|e| e.values));
        }
        Ok(all)
    }
}
