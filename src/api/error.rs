//! Unified API error handling
//!
//! Every failure is converted once into an [`ApiError`], logged, and rendered
//! as `{success: false, error, errorType, requestId}`.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::REQUEST_ID_HEADER;
use crate::db::DbError;
use crate::service::analysis::PipelineError;
use crate::service::context::LookupError;
use crate::service::llm::ProviderError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error message
    pub error: String,
    /// Error type/code
    pub error_type: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Entity belongs to another organization (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// Upstream provider failed or returned unusable output (502)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Upstream provider timed out (504)
    #[error("External service timeout: {0}")]
    GatewayTimeout(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal_error",
            ApiError::Database(_) => "database_error",
            ApiError::ExternalService(_) => "external_service_error",
            ApiError::GatewayTimeout(_) => "timeout",
        }
    }

    /// Attach the id of the request that failed
    pub fn with_request_id(self, request_id: Uuid) -> RequestError {
        RequestError {
            request_id,
            error: self,
        }
    }

    fn respond(&self, request_id: Uuid) -> HttpResponse {
        let status = self.status_code();

        tracing::error!(
            error_type = self.error_type(),
            status = status.as_u16(),
            request_id = %request_id,
            message = %self,
            "API error"
        );

        HttpResponse::build(status)
            .insert_header((REQUEST_ID_HEADER, request_id.to_string()))
            .json(ErrorResponse {
                success: false,
                error: self.to_string(),
                error_type: self.error_type().to_string(),
                request_id: request_id.to_string(),
            })
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.respond(Uuid::new_v4())
    }
}

/// An [`ApiError`] tied to the request id the pipeline ran under
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RequestError {
    pub request_id: Uuid,
    #[source]
    pub error: ApiError,
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        self.error.respond(self.request_id)
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(_) => ApiError::GatewayTimeout(err.to_string()),
            ProviderError::NotConfigured(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::ExternalService(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => ApiError::BadRequest(e.to_string()),
            PipelineError::Lookup(LookupError::NotFound(entity)) => {
                ApiError::NotFound(entity.to_string())
            }
            PipelineError::Lookup(LookupError::Forbidden(entity)) => {
                ApiError::Forbidden(format!("{} belongs to another organization", entity))
            }
            PipelineError::Lookup(LookupError::Store(e)) => e.into(),
            PipelineError::Provider(e) => e.into(),
            PipelineError::Parse(e) => {
                ApiError::ExternalService(format!("Failed to parse model response: {}", e))
            }
            PipelineError::Persistence(e) => e.into(),
        }
    }
}
