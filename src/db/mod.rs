//! Database module for PostgreSQL persistence

#[cfg(test)]
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::env;

// Environment variable names
const ENV_POSTGRES_HOST: &str = "OPENSOC_POSTGRES_HOST";
const ENV_POSTGRES_PORT: &str = "OPENSOC_POSTGRES_PORT";
const ENV_POSTGRES_USER: &str = "OPENSOC_POSTGRES_USER";
const ENV_POSTGRES_PASSWORD: &str = "OPENSOC_POSTGRES_PASSWORD";
const ENV_POSTGRES_DB: &str = "OPENSOC_POSTGRES_DB";

// Default values
const DEFAULT_POSTGRES_HOST: &str = "127.0.0.1";
const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POSTGRES_USER: &str = "opensoc";
const DEFAULT_POSTGRES_PASSWORD: &str = "opensoc";
const DEFAULT_POSTGRES_DB: &str = "opensoc";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Create a new database connection pool
pub async fn create_pool() -> Result<PgPool, DbError> {
    let host = env::var(ENV_POSTGRES_HOST).unwrap_or_else(|_| DEFAULT_POSTGRES_HOST.to_string());
    let port = env::var(ENV_POSTGRES_PORT).unwrap_or_else(|_| DEFAULT_POSTGRES_PORT.to_string());
    let user = env::var(ENV_POSTGRES_USER).unwrap_or_else(|_| DEFAULT_POSTGRES_USER.to_string());
    let password =
        env::var(ENV_POSTGRES_PASSWORD).unwrap_or_else(|_| DEFAULT_POSTGRES_PASSWORD.to_string());
    let database = env::var(ENV_POSTGRES_DB).unwrap_or_else(|_| DEFAULT_POSTGRES_DB.to_string());

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    );

    tracing::debug!(host = %host, port = %port, database = %database, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!(host = %host, port = %port, "PostgreSQL connection established");

    Ok(pool)
}

/// Statements run by [`init_schema`], in order
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        name TEXT NOT NULL,
        asset_type VARCHAR(50),
        ip_address VARCHAR(64),
        hostname TEXT,
        os_type VARCHAR(50),
        criticality VARCHAR(20),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        asset_id UUID REFERENCES assets(id) ON DELETE SET NULL,
        title TEXT NOT NULL,
        description TEXT,
        severity INTEGER NOT NULL DEFAULT 3,
        source_system VARCHAR(100),
        status VARCHAR(30) NOT NULL DEFAULT 'open',
        event_time TIMESTAMPTZ,
        raw_data JSONB NOT NULL DEFAULT '{}',
        enrichment_data JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS incidents (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        severity INTEGER NOT NULL DEFAULT 3,
        status VARCHAR(30) NOT NULL DEFAULT 'open',
        category VARCHAR(50),
        alert_ids UUID[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analysis_artifacts (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        entity_type VARCHAR(20) NOT NULL,
        entity_id UUID NOT NULL,
        artifact_kind VARCHAR(50) NOT NULL,
        content JSONB NOT NULL,
        content_hash VARCHAR(64) NOT NULL,
        provenance JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (entity_type, entity_id, artifact_kind)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS playbooks (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        source_alert_id UUID NOT NULL,
        playbook_type VARCHAR(30) NOT NULL,
        name TEXT NOT NULL,
        content JSONB NOT NULL,
        content_hash VARCHAR(64) NOT NULL,
        provenance JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (source_alert_id, playbook_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timeline_events (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        entity_type VARCHAR(20) NOT NULL,
        entity_id UUID NOT NULL,
        event_type VARCHAR(50) NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        metadata JSONB NOT NULL DEFAULT '{}',
        user_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_alerts_asset_created ON alerts(asset_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_alerts_organization ON alerts(organization_id)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_organization ON incidents(organization_id)",
    "CREATE INDEX IF NOT EXISTS idx_analysis_artifacts_organization ON analysis_artifacts(organization_id)",
    "CREATE INDEX IF NOT EXISTS idx_playbooks_organization ON playbooks(organization_id)",
    "CREATE INDEX IF NOT EXISTS idx_timeline_events_entity ON timeline_events(entity_type, entity_id, created_at)",
];

/// Initialize database schema
pub async fn init_schema(pool: &PgPool) -> Result<(), DbError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database schema initialized");

    Ok(())
}
