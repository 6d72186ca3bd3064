//! HTTP client for the threat-analyzer service.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerClientError {
    #[error("threat-analyzer HTTP error: {status} - {detail}")]
    Http { status: u16, detail: String },

    #[error("threat-analyzer request failed: {0}")]
    Request(String),
}

/// Encapsulates connection and calls to the analyzer endpoints.
pub struct AnalyzerClient {
    base_url: String,
    client: reqwest::Client,
}

impl AnalyzerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn analyze_endpoint(&self) -> String {
        format!("{}/api/v1/threat-model/analyze", self.base_url)
    }

    /// Send the image and return the analyzer's report JSON. Non-2xx
    /// responses carry the status and the first 500 characters of the body.
    pub async fn analyze(
        &self,
        image_bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<Value, AnalyzerClientError> {
        let part = reqwest::multipart::Part::bytes(image_bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| AnalyzerClientError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.analyze_endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalyzerClientError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalyzerClientError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(AnalyzerClientError::Http {
                status: status.as_u16(),
                detail: truncate_chars(&body, 500),
            });
        }

        serde_json::from_str(&body).map_err(|e| AnalyzerClientError::Request(e.to_string()))
    }
}

/// First `max` characters of a response body, for error reporting.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Content type for a stored image path, inferred from the extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = AnalyzerClient::new("http://analyzer:8001/", Duration::from_secs(300));
        assert_eq!(
            client.analyze_endpoint(),
            "http://analyzer:8001/api/v1/threat-model/analyze"
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 500), "ab");
        // multi-byte safety
        assert_eq!(truncate_chars("ação", 3), "açã");
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a.png")), "image/png");
        assert_eq!(content_type_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(content_type_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("a")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_unreachable_analyzer_is_request_error() {
        // Nothing listens on this port; the call must surface as Request.
        let client = AnalyzerClient::new("http://127.0.0.1:1", Duration::from_secs(1));
        let err = client
            .analyze(b"img".to_vec(), "x.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerClientError::Request(_)));
    }
}
