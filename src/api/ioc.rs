//! Standalone IOC reputation lookup

use actix_web::{HttpResponse, post, web};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{ApiError, ApiResponse};
use crate::model::ioc::IocReputation;
use crate::service::virustotal::{ReputationLookup, VirusTotalClient};

#[derive(Debug, Deserialize, ToSchema)]
pub struct IocLookupRequest {
    /// Hash, URL, IPv4 address or domain
    pub value: String,
}

/// Look up the VirusTotal reputation of an indicator
#[utoipa::path(
    post,
    path = "/v1/iocs/lookup",
    request_body = IocLookupRequest,
    responses(
        (status = 200, description = "Reputation retrieved", body = IocReputation),
        (status = 400, description = "Empty value or VirusTotal not configured", body = super::error::ErrorResponse),
        (status = 502, description = "VirusTotal request failed", body = super::error::ErrorResponse),
        (status = 504, description = "VirusTotal request timed out", body = super::error::ErrorResponse)
    ),
    tag = "iocs"
)]
#[post("/v1/iocs/lookup")]
pub async fn lookup_ioc(
    client: web::Data<Option<VirusTotalClient>>,
    body: web::Json<IocLookupRequest>,
) -> Result<HttpResponse, ApiError> {
    let Some(client) = client.as_ref() else {
        return Err(ApiError::BadRequest(
            "VirusTotal lookups require VIRUSTOTAL_API_KEY".to_string(),
        ));
    };

    let value = body.value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest("value must not be empty".to_string()));
    }

    let reputation = client.lookup(value).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(reputation)))
}

/// Configure IOC routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(lookup_ioc);
}
