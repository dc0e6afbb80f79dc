//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::{analysis, error, health, ioc, progress};
use crate::model::ioc::{IocReputation, IocType, ThreatLevel, VerdictConfidence};
use crate::model::request::AnalysisOptions;
use crate::service::analysis::{AnalysisOutcome, PlaybookBundle};
use crate::service::progress::{ProgressEvent, Stage, StageStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OpenSOC AI Analysis API",
        description = "Structured AI analyses, drafts and playbooks for alerts, incidents and assets"
    ),
    paths(
        analysis::analyze_alert,
        analysis::classify_alert,
        analysis::generate_playbooks,
        analysis::generate_playbook,
        analysis::generate_draft,
        ioc::lookup_ioc,
        progress::progress_feed,
        health::liveness,
        health::readiness,
    ),
    components(schemas(
        AnalysisOptions,
        AnalysisOutcome,
        PlaybookBundle,
        IocReputation,
        IocType,
        ThreatLevel,
        VerdictConfidence,
        ioc::IocLookupRequest,
        ProgressEvent,
        Stage,
        StageStatus,
        error::ErrorResponse,
        health::Liveness,
        health::Readiness,
        health::ComponentStatus,
        health::ComponentState,
    )),
    tags(
        (name = "analysis", description = "Alert analysis and classification"),
        (name = "playbooks", description = "Response playbook generation"),
        (name = "drafts", description = "Impact, investigation, containment, timeline, incident, threat hunt and log analysis drafts"),
        (name = "iocs", description = "Indicator reputation"),
        (name = "progress", description = "Pipeline progress feed"),
        (name = "health", description = "Liveness and dependency status")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.as_str() == "/v1/alerts/{id}/classification"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/{entity}/{id}/drafts/{kind}"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/iocs/lookup"));
        assert!(doc.to_yaml().is_ok());
    }
}
