//! Liveness and dependency status endpoints
//!
//! Readiness needs the database and the LLM provider. IOC enrichment is
//! optional and only reported.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use actix_web::{HttpResponse, get, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::store::EntityStore;
use crate::service::llm::LlmClient;

/// State of one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Up,
    Down,
    Disabled,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub name: &'static str,
    pub state: ComponentState,
    /// Failure reason or configuration note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Liveness {
    pub alive: bool,
    pub version: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    /// True when every required component is up
    pub ready: bool,
    pub version: &'static str,
    pub components: Vec<ComponentStatus>,
}

/// Dependencies the readiness endpoint checks
#[derive(Clone)]
pub struct DependencyChecks {
    store: Arc<dyn EntityStore>,
    llm: LlmClient,
    /// Name of the configured reputation service, `None` when enrichment is off
    enrichment: Option<&'static str>,
}

impl DependencyChecks {
    pub fn new(
        store: Arc<dyn EntityStore>,
        llm: LlmClient,
        enrichment: Option<&'static str>,
    ) -> Self {
        Self {
            store,
            llm,
            enrichment,
        }
    }

    /// Check every dependency concurrently
    pub async fn run(&self) -> Readiness {
        let (database, llm) = futures::join!(
            timed("database", self.store.ping()),
            timed("llm", self.llm.check_reachable()),
        );
        let llm = ComponentStatus {
            detail: llm
                .detail
                .or_else(|| Some(format!("{} ({})", self.llm.provider_id(), self.llm.model()))),
            ..llm
        };

        let enrichment = match self.enrichment {
            Some(service) => ComponentStatus {
                name: "ioc_enrichment",
                state: ComponentState::Up,
                detail: Some(service.to_string()),
                latency_ms: None,
            },
            None => ComponentStatus {
                name: "ioc_enrichment",
                state: ComponentState::Disabled,
                detail: Some("no reputation API key configured".to_string()),
                latency_ms: None,
            },
        };

        let ready = database.state == ComponentState::Up && llm.state == ComponentState::Up;
        Readiness {
            ready,
            version: env!("CARGO_PKG_VERSION"),
            components: vec![database, llm, enrichment],
        }
    }
}

async fn timed<E: std::fmt::Display>(
    name: &'static str,
    check: impl Future<Output = Result<(), E>>,
) -> ComponentStatus {
    let start = Instant::now();
    let result = check.await;
    let latency_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => ComponentStatus {
            name,
            state: ComponentState::Up,
            detail: None,
            latency_ms,
        },
        Err(e) => {
            tracing::error!(component = name, error = %e, "Dependency check failed");
            ComponentStatus {
                name,
                state: ComponentState::Down,
                detail: Some(e.to_string()),
                latency_ms,
            }
        }
    }
}

/// The process is up and serving requests
#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Process is alive", body = Liveness)
    ),
    tag = "health"
)]
#[get("/health/live")]
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(Liveness {
        alive: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Database and LLM provider status, plus whether IOC enrichment is configured
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Database and LLM provider are reachable", body = Readiness),
        (status = 503, description = "A required dependency is down", body = Readiness)
    ),
    tag = "health"
)]
#[get("/health/ready")]
pub async fn readiness(checks: web::Data<DependencyChecks>) -> HttpResponse {
    let report = checks.run().await;
    tracing::debug!(ready = report.ready, "Readiness checked");

    if report.ready {
        HttpResponse::Ok().json(report)
    } else {
        HttpResponse::ServiceUnavailable().json(report)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(liveness).service(readiness);
}
