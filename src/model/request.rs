//! Per-call analysis request and its caller-supplied options

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::analysis::AnalysisKind;
use super::entity::EntityRef;

const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_TOKENS_LIMIT: u32 = 32_768;

/// Caller-supplied request fields failed basic shape checks
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Optional generation parameters supplied with a request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    /// Provider timeout override in seconds (1-600)
    pub timeout_secs: Option<u64>,
    /// Maximum tokens to generate (1-32768)
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0-2.0)
    pub temperature: Option<f32>,
    /// Model override for this call
    pub model: Option<String>,
    /// Look up IOCs found in the alert with VirusTotal before prompting
    pub enrich_iocs: bool,
    /// Override the configured timeline recording
    pub record_timeline: Option<bool>,
}

impl AnalysisOptions {
    /// Decode and check a request body; an empty body means no overrides
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let options: Self = serde_json::from_slice(body)
            .map_err(|e| ValidationError(format!("invalid request body: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(timeout) = self.timeout_secs
            && !(1..=MAX_TIMEOUT_SECS).contains(&timeout)
        {
            return Err(ValidationError(format!(
                "timeoutSecs must be between 1 and {}, got {}",
                MAX_TIMEOUT_SECS, timeout
            )));
        }

        if let Some(max_tokens) = self.max_tokens
            && !(1..=MAX_TOKENS_LIMIT).contains(&max_tokens)
        {
            return Err(ValidationError(format!(
                "maxTokens must be between 1 and {}, got {}",
                MAX_TOKENS_LIMIT, max_tokens
            )));
        }

        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ValidationError(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        if let Some(ref model) = self.model
            && model.trim().is_empty()
        {
            return Err(ValidationError("model must not be empty".to_string()));
        }

        Ok(())
    }
}

/// One analysis call; lives for the duration of the request only
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub request_id: Uuid,
    pub source: EntityRef,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(source: EntityRef, organization_id: Uuid, user_id: Option<Uuid>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            source,
            organization_id,
            user_id,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the request can run the given kind before any external call is made
    pub fn validate_for(&self, kind: AnalysisKind) -> Result<(), ValidationError> {
        if self.organization_id.is_nil() {
            return Err(ValidationError("organization id is required".to_string()));
        }

        if !kind.accepts(self.source.kind) {
            // every entity kind name starts with a vowel
            return Err(ValidationError(format!(
                "{} cannot be generated for an {}",
                kind.display_name(),
                self.source.kind
            )));
        }

        self.options.validate()
    }
}
