//! Application state and service initialization
//!
//! This module centralizes service initialization and dependency injection so
//! `main` only wires the resulting state into the HTTP server.

use std::sync::Arc;

use crate::api::health::DependencyChecks;
use crate::db::repository::PgRepository;
use crate::model::Config;
use crate::service::analysis::AnalysisPipeline;
use crate::service::context::ContextBuilder;
use crate::service::llm::LlmClient;
use crate::service::progress::ProgressNotifier;
use crate::service::sink::PersistenceSink;
use crate::service::virustotal::VirusTotalClient;

/// Application state containing all services and shared resources
pub struct AppState {
    /// Dependencies reported by the readiness endpoint
    pub health: DependencyChecks,
    /// Analysis pipeline shared by all handlers
    pub pipeline: AnalysisPipeline,
    /// VirusTotal client, present when an API key is configured
    pub virustotal: Option<VirusTotalClient>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Database connection and schema initialization
    /// 2. LLM provider initialization
    /// 3. Optional VirusTotal client setup
    /// 4. Pipeline construction
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let db_pool = crate::db::create_pool()
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        crate::db::init_schema(&db_pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        let llm_client =
            LlmClient::from_config(&config.llm).map_err(|e| AppError::LlmInit(e.to_string()))?;

        let virustotal = VirusTotalClient::from_config(&config.virustotal);
        match virustotal {
            Some(_) => tracing::info!("VirusTotal enrichment enabled"),
            None => tracing::warn!("VIRUSTOTAL_API_KEY not set, IOC enrichment disabled"),
        }

        let repository = Arc::new(PgRepository::new(db_pool.clone()));

        let health = DependencyChecks::new(
            repository.clone(),
            llm_client.clone(),
            virustotal.as_ref().map(|_| "virustotal"),
        );

        let mut context = ContextBuilder::new(repository.clone());
        if let Some(client) = virustotal.clone() {
            context = context.with_reputation(Arc::new(client));
        }

        let pipeline = AnalysisPipeline::new(
            context,
            llm_client,
            PersistenceSink::new(repository),
            ProgressNotifier::default(),
            config.pipeline,
        );

        Ok(Self {
            health,
            pipeline,
            virustotal,
        })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// LLM provider could not be configured
    #[error("LLM provider initialization failed: {0}")]
    LlmInit(String),
}
