//! OpenAI-compatible chat completions provider (NVIDIA NIM hosted models)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    Completion, CompletionProvider, CompletionRequest, ProviderError, expect_success, status_error,
};

#[derive(Debug)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's content and the reported model out of a chat response body
pub fn parse_chat_envelope(body: &str) -> Result<(String, Option<String>), ProviderError> {
    let envelope: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Malformed chat completion response: {}", e))
    })?;

    let text = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| {
            ProviderError::InvalidResponse("Chat completion response has no content".to_string())
        })?;

    Ok((text, envelope.model.filter(|m| !m.is_empty())))
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn provider_id(&self) -> &'static str {
        "openai_compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();
        let model = request.model.as_deref().unwrap_or(&self.model);

        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
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
        let (text, reported_model) = parse_chat_envelope(&raw)?;

        Ok(Completion {
            text,
            provider: self.provider_id().to_string(),
            model_id: reported_model.unwrap_or_else(|| model.to_string()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn check_reachable(&self, timeout: Duration) -> Result<(), ProviderError> {
        let request = self.client.get(self.models_url()).bearer_auth(&self.api_key);
        expect_success(request, timeout).await
    }
}
