//! Error types for the analysis pipeline

use thiserror::Error;

use crate::db::DbError;
use crate::model::request::ValidationError;
use crate::service::context::LookupError;
use crate::service::llm::ProviderError;

/// The completion could not be turned into a conforming object
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("No JSON object found in model response")]
    NoJsonFound,

    #[error("Invalid JSON at offset {offset}: {message} (near `{snippet}`)")]
    InvalidJson {
        offset: usize,
        message: String,
        snippet: String,
    },

    #[error("Expected a JSON object at the top level, found {0}")]
    NotAnObject(&'static str),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Field '{field}' has value '{value}', expected one of: {}", .allowed.join(", "))]
    InvalidEnum {
        field: String,
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("Field '{field}' should be {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("Result violates constraints: {}", .0.join("; "))]
    Constraint(Vec<String>),
}

/// Any failure of a single pipeline run
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("LLM provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to parse model response: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to persist result: {0}")]
    Persistence(DbError),
}

impl PipelineError {
    /// Short label used in progress events and logs
    pub fn error_type(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Lookup(_) => "lookup",
            PipelineError::Provider(_) => "provider",
            PipelineError::Parse(_) => "parse",
            PipelineError::Persistence(_) => "persistence",
        }
    }
}
