//! Ollama provider using the non-streaming generate endpoint

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    Completion, CompletionProvider, CompletionRequest, ProviderError, expect_success, status_error,
};

#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull completion text and reported model out of a generate response body
pub fn parse_generate_envelope(body: &str) -> Result<(String, Option<String>), ProviderError> {
    let envelope: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Malformed Ollama response: {}", e)))?;

    if let Some(error) = envelope.error {
        return Err(ProviderError::InvalidResponse(error));
    }

    let text = envelope.response.ok_or_else(|| {
        ProviderError::InvalidResponse("Ollama response has no 'response' field".to_string())
    })?;

    Ok((text, envelope.model.filter(|m| !m.is_empty())))
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn provider_id(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();
        let model = request.model.as_deref().unwrap_or(&self.model);

        let body = GenerateRequest {
            model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, request.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let raw = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, request.timeout))?;
        let (text, reported_model) = parse_generate_envelope(&raw)?;

        Ok(Completion {
            text,
            provider: self.provider_id().to_string(),
            model_id: reported_model.unwrap_or_else(|| model.to_string()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn check_reachable(&self, timeout: Duration) -> Result<(), ProviderError> {
        expect_success(self.client.get(self.tags_url()), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_envelope() {
        let body = r#"{"model":"llama3.1:8b","created_at":"2025-01-01T00:00:00Z","response":"{\"a\":1}","done":true}"#;
        let (text, model) = parse_generate_envelope(body).unwrap();
        assert_eq!(text, r#"{"a":1}"#);
        assert_eq!(model.as_deref(), Some("llama3.1:8b"));
    }

    #[test]
    fn test_parse_generate_envelope_error_field() {
        let body = r#"{"error":"model 'llama9' not found"}"#;
        let err = parse_generate_envelope(body).unwrap_err();
        assert!(err.to_string().contains("llama9"));
    }

    #[test]
    fn test_parse_generate_envelope_not_json() {
        let err = parse_generate_envelope("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_generate_request_shape() {
        let body = GenerateRequest {
            model: "llama3.1:8b",
            prompt: "p",
            system: "",
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                top_p: 1.0,
                num_predict: 300,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("system").is_none());
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 300);
    }

    #[tokio::test]
    #[ignore] // Requires a running Ollama server
    async fn test_generate_against_local_server() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3.1:8b");
        let request = CompletionRequest {
            system: String::new(),
            prompt: "Reply with {\"ok\": true}".to_string(),
            max_tokens: 50,
            temperature: 0.0,
            top_p: 1.0,
            model: None,
            timeout: std::time::Duration::from_secs(60),
        };
        assert!(provider.complete(&request).await.is_ok());
    }
}
