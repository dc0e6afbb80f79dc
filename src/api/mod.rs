//! HTTP API

pub mod analysis;
pub mod error;
pub mod health;
pub mod ioc;
pub mod openapi;
pub mod progress;

use actix_web::HttpRequest;
use serde::Serialize;
use uuid::Uuid;

pub use error::{ApiError, RequestError};

pub const ORGANIZATION_HEADER: &str = "X-Organization-Id";
pub const USER_HEADER: &str = "X-User-Id";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Success envelope shared by all endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Identity of the caller taken from request headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub organization_id: Uuid,
    pub user_id: Uuid,
}

impl Caller {
    pub fn from_request(req: &HttpRequest) -> Result<Self, ApiError> {
        Ok(Self {
            organization_id: uuid_header(req, ORGANIZATION_HEADER)?,
            user_id: uuid_header(req, USER_HEADER)?,
        })
    }
}

/// Request id supplied by the client, or a fresh one when the header is absent
pub fn request_id(req: &HttpRequest) -> Result<Uuid, RequestError> {
    if req.headers().contains_key(REQUEST_ID_HEADER) {
        uuid_header(req, REQUEST_ID_HEADER).map_err(|e| e.with_request_id(Uuid::new_v4()))
    } else {
        Ok(Uuid::new_v4())
    }
}

fn uuid_header(req: &HttpRequest, name: &str) -> Result<Uuid, ApiError> {
    let value = req
        .headers()
        .get(name)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", name)))?;

    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("{} header must be a UUID", name)))
}
