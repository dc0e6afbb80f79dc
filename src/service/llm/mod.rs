//! LLM invocation client
//!
//! One HTTP call per analysis request. Providers return raw completion text;
//! extraction and normalization happen downstream. There is no retry and no
//! cached fallback: a failed call is a failed request.

pub mod nat;
pub mod ollama;
pub mod openai;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::model::config::{LlmConfig, ProviderKind};
use crate::model::request::AnalysisOptions;

pub use nat::NatExecutionProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;

/// Characters of completion text included in debug logs
const LOG_SNIPPET_CHARS: usize = 200;
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Provider call failures
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ProviderError {
    /// Map a reqwest failure, recording the timeout that was in force
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout.as_secs())
        } else if err.is_connect() {
            ProviderError::Connection(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Request(err.to_string())
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// A single completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Overrides the provider's configured model
    pub model: Option<String>,
    pub timeout: Duration,
}

/// Raw provider output; discarded once parsed
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub provider: String,
    /// Model reported by the provider, else the model that was requested
    pub model_id: String,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync + Debug {
    /// Stable identifier recorded in provenance (e.g. "ollama")
    fn provider_id(&self) -> &'static str;

    /// Configured model name
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;

    /// Cheap request showing the provider answers; no completion is generated
    async fn check_reachable(&self, _timeout: Duration) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Shared LLM client wrapper
#[derive(Clone, Debug)]
pub struct LlmClient {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// Build the configured provider
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let base_url = config.resolved_base_url();
        let model = config.resolved_model();

        let parsed = url::Url::parse(&base_url).map_err(|e| {
            ProviderError::NotConfigured(format!("invalid base URL '{}': {}", base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::NotConfigured(format!(
                "base URL '{}' must use http or https",
                base_url
            )));
        }

        let provider: Arc<dyn CompletionProvider> = match config.provider {
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(base_url, model)),
            ProviderKind::OpenaiCompatible => {
                let api_key = config.api_key.clone().ok_or_else(|| {
                    ProviderError::NotConfigured(
                        "OPENSOC_LLM_API_KEY or NVIDIA_API_KEY must be set for the OpenAI-compatible provider"
                            .to_string(),
                    )
                })?;
                Arc::new(OpenAiCompatibleProvider::new(base_url, model, api_key))
            }
            ProviderKind::Nat => Arc::new(NatExecutionProvider::new(base_url, model)),
        };

        tracing::info!(
            provider = provider.provider_id(),
            model = %provider.model(),
            "LLM client initialized"
        );

        Ok(Self::with_provider(provider, config))
    }

    pub fn with_provider(provider: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.provider_id()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Build a request from rendered prompts, applying per-call overrides to configured defaults
    pub fn request(
        &self,
        system: &str,
        prompt: &str,
        options: &AnalysisOptions,
        default_timeout: Duration,
    ) -> CompletionRequest {
        CompletionRequest {
            system: system.to_string(),
            prompt: prompt.to_string(),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            temperature: options.temperature.unwrap_or(self.temperature),
            top_p: self.top_p,
            model: options.model.clone(),
            timeout: options
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default_timeout),
        }
    }

    pub async fn check_reachable(&self) -> Result<(), ProviderError> {
        self.provider.check_reachable(REACHABILITY_TIMEOUT).await
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();

        tracing::debug!(
            provider = self.provider_id(),
            prompt_length = request.prompt.len(),
            timeout_secs = request.timeout.as_secs(),
            "Sending completion request"
        );

        match self.provider.complete(request).await {
            Ok(completion) => {
                tracing::info!(
                    provider = %completion.provider,
                    model = %completion.model_id,
                    response_length = completion.text.len(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "LLM completion completed successfully"
                );
                tracing::debug!(
                    snippet = %snippet(&completion.text, LOG_SNIPPET_CHARS),
                    "LLM completion text"
                );
                Ok(completion)
            }
            Err(e) => {
                tracing::error!(
                    provider = self.provider_id(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "LLM completion failed"
                );
                Err(e)
            }
        }
    }
}

/// Send a GET and require a success status
pub(crate) async fn expect_success(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<(), ProviderError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(e, timeout))?;
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    Ok(())
}

/// Read a non-success response into a status error
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Status { status, body }
}

fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
