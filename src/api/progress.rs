//! Server-sent events feed of pipeline progress

use actix_web::{HttpRequest, HttpResponse, get, web};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use utoipa::IntoParams;
use uuid::Uuid;

use super::{ApiError, Caller};
use crate::service::analysis::AnalysisPipeline;
use crate::service::progress::ProgressEvent;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    /// Only stream events for this request
    pub request_id: Option<Uuid>,
}

/// Encode one event as an SSE frame
pub fn sse_frame(event: &ProgressEvent) -> Result<web::Bytes, serde_json::Error> {
    let data = serde_json::to_string(event)?;
    Ok(web::Bytes::from(format!("event: progress\ndata: {}\n\n", data)))
}

/// Whether a subscriber from `organization_id` may see `event`
fn visible_to(event: &ProgressEvent, organization_id: Uuid, request_id: Option<Uuid>) -> bool {
    event.organization_id == organization_id && request_id.is_none_or(|id| id == event.request_id)
}

/// Stream pipeline progress events for the caller's organization
#[utoipa::path(
    get,
    path = "/v1/progress",
    params(
        ProgressParams,
        ("X-Organization-Id" = Uuid, Header, description = "Caller organization"),
        ("X-User-Id" = Uuid, Header, description = "Caller user")
    ),
    responses(
        (status = 200, description = "text/event-stream of progress events", body = ProgressEvent),
        (status = 400, description = "Missing or invalid caller headers", body = super::error::ErrorResponse)
    ),
    tag = "progress"
)]
#[get("/v1/progress")]
pub async fn progress_feed(
    pipeline: web::Data<AnalysisPipeline>,
    req: HttpRequest,
    query: web::Query<ProgressParams>,
) -> Result<HttpResponse, ApiError> {
    let caller = Caller::from_request(&req)?;
    let receiver = pipeline.progress().subscribe();
    let filter = query.request_id;

    tracing::debug!(
        organization_id = %caller.organization_id,
        request_id = ?filter,
        "Progress subscriber connected"
    );

    let stream = futures::stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if !visible_to(&event, caller.organization_id, filter) {
                        continue;
                    }
                    return Some((sse_frame(&event), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Progress subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

/// Configure progress routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(progress_feed);
}
