//! REST API endpoints for AI analyses, drafts and playbooks

use actix_web::{HttpRequest, HttpResponse, post, web};
use uuid::Uuid;

use super::{ApiError, ApiResponse, Caller, REQUEST_ID_HEADER, RequestError, request_id};
use crate::model::analysis::{AnalysisKind, PlaybookType};
use crate::model::entity::{EntityKind, EntityRef};
use crate::model::request::{AnalysisOptions, AnalysisRequest};
use crate::service::analysis::{AnalysisOutcome, AnalysisPipeline, PlaybookBundle};

/// Kinds served by the generic drafts endpoint
const DRAFT_KINDS: [AnalysisKind; 7] = [
    AnalysisKind::ImpactAssessment,
    AnalysisKind::InvestigationPlan,
    AnalysisKind::ContainmentStrategy,
    AnalysisKind::Timeline,
    AnalysisKind::IncidentForm,
    AnalysisKind::ThreatHunt,
    AnalysisKind::LogAnalysis,
];

fn build_request(
    req: &HttpRequest,
    request_id: Uuid,
    source: EntityRef,
    body: &[u8],
) -> Result<AnalysisRequest, RequestError> {
    let caller = Caller::from_request(req).map_err(|e| e.with_request_id(request_id))?;
    let options = AnalysisOptions::from_body(body)
        .map_err(|e| ApiError::BadRequest(e.to_string()).with_request_id(request_id))?;

    let mut request = AnalysisRequest::new(source, caller.organization_id, Some(caller.user_id))
        .with_options(options);
    request.request_id = request_id;
    Ok(request)
}

fn respond<T: serde::Serialize>(request_id: Uuid, data: T) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((REQUEST_ID_HEADER, request_id.to_string()))
        .json(ApiResponse::ok(data))
}

async fn run_analysis(
    pipeline: &AnalysisPipeline,
    req: &HttpRequest,
    request_id: Uuid,
    source: EntityRef,
    kind: AnalysisKind,
    body: &[u8],
) -> Result<HttpResponse, RequestError> {
    let request = build_request(req, request_id, source, body)?;

    let outcome = pipeline
        .run(&request, kind)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;

    Ok(respond(request_id, outcome))
}

/// Parse the draft kind path segment
pub fn parse_draft_kind(value: &str) -> Result<AnalysisKind, ApiError> {
    AnalysisKind::parse(value)
        .filter(|kind| DRAFT_KINDS.contains(kind))
        .ok_or_else(|| {
            let allowed: Vec<&str> = DRAFT_KINDS.iter().map(|k| k.as_str()).collect();
            ApiError::BadRequest(format!(
                "unknown draft kind '{}', expected one of: {}",
                value,
                allowed.join(", ")
            ))
        })
}

/// Generate an AI analysis for an alert
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/analysis",
    params(
        ("id" = Uuid, Path, description = "Alert ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Caller organization"),
        ("X-User-Id" = Uuid, Header, description = "Caller user"),
        ("X-Request-Id" = Option<Uuid>, Header, description = "Client-chosen request id, echoed back")
    ),
    request_body(content = AnalysisOptions, description = "Generation overrides"),
    responses(
        (status = 200, description = "Analysis generated and stored", body = AnalysisOutcome),
        (status = 400, description = "Invalid request", body = super::error::ErrorResponse),
        (status = 403, description = "Alert belongs to another organization", body = super::error::ErrorResponse),
        (status = 404, description = "Alert not found", body = super::error::ErrorResponse),
        (status = 502, description = "Provider failed or returned unusable output", body = super::error::ErrorResponse),
        (status = 504, description = "Provider timed out", body = super::error::ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/v1/alerts/{id}/analysis")]
pub async fn analyze_alert(
    pipeline: web::Data<AnalysisPipeline>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, RequestError> {
    let request_id = request_id(&req)?;
    let source = EntityRef::alert(path.into_inner());
    run_analysis(&pipeline, &req, request_id, source, AnalysisKind::AlertAnalysis, &body).await
}

/// Classify an alert into a security event type
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/classification",
    params(
        ("id" = Uuid, Path, description = "Alert ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Caller organization"),
        ("X-User-Id" = Uuid, Header, description = "Caller user"),
        ("X-Request-Id" = Option<Uuid>, Header, description = "Client-chosen request id, echoed back")
    ),
    request_body(content = AnalysisOptions, description = "Generation overrides"),
    responses(
        (status = 200, description = "Classification generated and stored", body = AnalysisOutcome),
        (status = 400, description = "Invalid request", body = super::error::ErrorResponse),
        (status = 404, description = "Alert not found", body = super::error::ErrorResponse),
        (status = 502, description = "Provider failed or returned unusable output", body = super::error::ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/v1/alerts/{id}/classification")]
pub async fn classify_alert(
    pipeline: web::Data<AnalysisPipeline>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, RequestError> {
    let request_id = request_id(&req)?;
    let source = EntityRef::alert(path.into_inner());
    run_analysis(&pipeline, &req, request_id, source, AnalysisKind::Classification, &body).await
}

/// Generate both playbooks for an alert concurrently
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/playbooks",
    params(
        ("id" = Uuid, Path, description = "Alert ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Caller organization"),
        ("X-User-Id" = Uuid, Header, description = "Caller user"),
        ("X-Request-Id" = Option<Uuid>, Header, description = "Client-chosen request id, echoed back")
    ),
    request_body(content = AnalysisOptions, description = "Generation overrides"),
    responses(
        (status = 200, description = "Both playbooks generated and stored", body = PlaybookBundle),
        (status = 400, description = "Invalid request", body = super::error::ErrorResponse),
        (status = 404, description = "Alert not found", body = super::error::ErrorResponse),
        (status = 502, description = "Provider failed or returned unusable output", body = super::error::ErrorResponse)
    ),
    tag = "playbooks"
)]
#[post("/v1/alerts/{id}/playbooks")]
pub async fn generate_playbooks(
    pipeline: web::Data<AnalysisPipeline>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, RequestError> {
    let request_id = request_id(&req)?;
    let request = build_request(&req, request_id, EntityRef::alert(path.into_inner()), &body)?;

    let bundle = pipeline
        .generate_playbooks(&request)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;

    Ok(respond(request_id, bundle))
}

/// Generate one playbook for an alert
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/playbooks/{playbook_type}",
    params(
        ("id" = Uuid, Path, description = "Alert ID"),
        ("playbook_type" = String, Path, description = "immediate_action or investigation"),
        ("X-Organization-Id" = Uuid, Header, description = "Caller organization"),
        ("X-User-Id" = Uuid, Header, description = "Caller user"),
        ("X-Request-Id" = Option<Uuid>, Header, description = "Client-chosen request id, echoed back")
    ),
    request_body(content = AnalysisOptions, description = "Generation overrides"),
    responses(
        (status = 200, description = "Playbook generated and stored", body = AnalysisOutcome),
        (status = 400, description = "Invalid request", body = super::error::ErrorResponse),
        (status = 404, description = "Alert not found", body = super::error::ErrorResponse),
        (status = 502, description = "Provider failed or returned unusable output", body = super::error::ErrorResponse)
    ),
    tag = "playbooks"
)]
#[post("/v1/alerts/{id}/playbooks/{playbook_type}")]
pub async fn generate_playbook(
    pipeline: web::Data<AnalysisPipeline>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
    body: web::Bytes,
) -> Result<HttpResponse, RequestError> {
    let request_id = request_id(&req)?;
    let (alert_id, playbook_type) = path.into_inner();
    let kind = PlaybookType::parse(&playbook_type)
        .map(|t| t.analysis_kind())
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unknown playbook type '{}', expected immediate_action or investigation",
                playbook_type
            ))
            .with_request_id(request_id)
        })?;

    run_analysis(&pipeline, &req, request_id, EntityRef::alert(alert_id), kind, &body).await
}

/// Generate a draft for an alert, incident or asset
#[utoipa::path(
    post,
    path = "/v1/{entity}/{id}/drafts/{kind}",
    params(
        ("entity" = String, Path, description = "alerts, incidents or assets"),
        ("id" = Uuid, Path, description = "Entity ID"),
        ("kind" = String, Path, description = "impact_assessment, investigation_plan, containment_strategy, timeline, incident_form, threat_hunt or log_analysis"),
        ("X-Organization-Id" = Uuid, Header, description = "Caller organization"),
        ("X-User-Id" = Uuid, Header, description = "Caller user"),
        ("X-Request-Id" = Option<Uuid>, Header, description = "Client-chosen request id, echoed back")
    ),
    request_body(content = AnalysisOptions, description = "Generation overrides"),
    responses(
        (status = 200, description = "Draft generated and stored", body = AnalysisOutcome),
        (status = 400, description = "Invalid request or kind not applicable", body = super::error::ErrorResponse),
        (status = 403, description = "Entity belongs to another organization", body = super::error::ErrorResponse),
        (status = 404, description = "Entity not found", body = super::error::ErrorResponse),
        (status = 502, description = "Provider failed or returned unusable output", body = super::error::ErrorResponse)
    ),
    tag = "drafts"
)]
#[post("/v1/{entity}/{id}/drafts/{kind}")]
pub async fn generate_draft(
    pipeline: web::Data<AnalysisPipeline>,
    req: HttpRequest,
    path: web::Path<(String, Uuid, String)>,
    body: web::Bytes,
) -> Result<HttpResponse, RequestError> {
    let request_id = request_id(&req)?;
    let (collection, id, kind) = path.into_inner();

    let entity_kind = EntityKind::from_path_segment(&collection).ok_or_else(|| {
        ApiError::NotFound(format!("unknown collection '{}'", collection))
            .with_request_id(request_id)
    })?;
    let kind = parse_draft_kind(&kind).map_err(|e| e.with_request_id(request_id))?;

    let source = EntityRef {
        kind: entity_kind,
        id,
    };
    run_analysis(&pipeline, &req, request_id, source, kind, &body).await
}

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze_alert)
        .service(classify_alert)
        .service(generate_playbooks)
        .service(generate_playbook)
        .service(generate_draft);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test as actix_test};

    use super::*;
    use crate::api::{ORGANIZATION_HEADER, USER_HEADER};
    use crate::db::memory::{MemoryStore, sample_alert};
    use crate::model::config::{LlmConfig, PipelineConfig};
    use crate::service::context::ContextBuilder;
    use crate::service::llm::LlmClient;
    use crate::service::llm::testing::ScriptedProvider;
    use crate::service::progress::ProgressNotifier;
    use crate::service::sink::PersistenceSink;

    fn pipeline(store: Arc<MemoryStore>, reply: &str) -> AnalysisPipeline {
        AnalysisPipeline::new(
            ContextBuilder::new(store.clone()),
            LlmClient::with_provider(Arc::new(ScriptedProvider::always(reply)), &LlmConfig::default()),
            PersistenceSink::new(store),
            ProgressNotifier::default(),
            PipelineConfig::default(),
        )
    }

    #[test]
    fn test_parse_draft_kind() {
        assert_eq!(parse_draft_kind("timeline").unwrap(), AnalysisKind::Timeline);
        assert_eq!(parse_draft_kind("threat_hunt").unwrap(), AnalysisKind::ThreatHunt);
        assert!(parse_draft_kind("classification").is_err());
        assert!(parse_draft_kind("nonsense").is_err());
    }

    #[actix_web::test]
    async fn test_classification_endpoint() {
        let org = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let alert = sample_alert(org, None);
        store.insert_alert(alert.clone());

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(
                    store.clone(),
                    r#"{"securityEventType": "Malware Infection", "overallConfidence": "90%"}"#,
                )))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri(&format!("/v1/alerts/{}/classification", alert.id))
            .insert_header((ORGANIZATION_HEADER, org.to_string()))
            .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["content"]["securityEventType"], "malware_infection");
        assert_eq!(body["data"]["content"]["overallConfidence"], 90.0);
        assert_eq!(store.artifact_count(), 1);
    }

    #[actix_web::test]
    async fn test_missing_headers_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(store, "{}")))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri(&format!("/v1/alerts/{}/analysis", Uuid::new_v4()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_log_analysis_draft_for_alert() {
        let org = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let alert = sample_alert(org, None);
        store.insert_alert(alert.clone());
        let reply = r#"{"suspiciousActivities": ["Beacon to 203.0.113.100"], "iocCandidates": ["203.0.113.100"]}"#;
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(store.clone(), reply)))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri(&format!("/v1/alerts/{}/drafts/log_analysis", alert.id))
            .insert_header((ORGANIZATION_HEADER, org.to_string()))
            .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["data"]["result"]["kind"], "log_analysis");
        assert_eq!(body["data"]["result"]["result"]["iocCandidates"][0], "203.0.113.100");
    }

    #[actix_web::test]
    async fn test_threat_hunt_without_reputation_is_rejected() {
        let org = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let alert = sample_alert(org, None);
        store.insert_alert(alert.clone());
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(store.clone(), "{}")))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri(&format!("/v1/alerts/{}/drafts/threat_hunt", alert.id))
            .insert_header((ORGANIZATION_HEADER, org.to_string()))
            .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.write_count(), 0);
    }

    #[actix_web::test]
    async fn test_draft_for_unknown_alert_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(store, "{}")))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri(&format!("/v1/alerts/{}/drafts/timeline", Uuid::new_v4()))
            .insert_header((ORGANIZATION_HEADER, Uuid::new_v4().to_string()))
            .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["errorType"], "not_found");
        assert!(body["requestId"].is_string());
    }

    #[actix_web::test]
    async fn test_malformed_body_is_rejected_before_any_write() {
        let org = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let alert = sample_alert(org, None);
        store.insert_alert(alert.clone());

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(
                    store.clone(),
                    r#"{"securityEventType": "malware_infection"}"#,
                )))
                .configure(configure),
        )
        .await;

        for body in [r#"{"temperature": 9.0}"#, r#"{"enrichIocs": "yes"}"#, "not json"] {
            let req = actix_test::TestRequest::post()
                .uri(&format!("/v1/alerts/{}/classification", alert.id))
                .insert_header((ORGANIZATION_HEADER, org.to_string()))
                .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
                .insert_header(("Content-Type", "application/json"))
                .set_payload(body)
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        }

        assert_eq!(store.write_count(), 0);
    }

    #[actix_web::test]
    async fn test_client_request_id_is_echoed() {
        let org = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let alert = sample_alert(org, None);
        store.insert_alert(alert.clone());

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline(
                    store.clone(),
                    r#"{"securityEventType": "insider_threat"}"#,
                )))
                .configure(configure),
        )
        .await;

        let request_id = Uuid::new_v4();
        let req = actix_test::TestRequest::post()
            .uri(&format!("/v1/alerts/{}/classification", alert.id))
            .insert_header((ORGANIZATION_HEADER, org.to_string()))
            .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
            .insert_header((REQUEST_ID_HEADER, request_id.to_string()))
            .set_payload(r#"{"maxTokens": 256}"#)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(REQUEST_ID_HEADER).unwrap(),
            request_id.to_string().as_str()
        );
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["data"]["requestId"], request_id.to_string());
    }
}
