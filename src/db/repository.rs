//! Postgres implementation of the entity store and artifact sink

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::DbError;
use super::models::{AlertRow, AssetRow, IncidentRow, UpsertRow};
use super::store::{ArtifactSink, EntityStore};
use crate::model::analysis::{AnalysisKind, PlaybookType};
use crate::model::artifact::{PersistedArtifact, TimelineEvent, WriteOutcome};
use crate::model::entity::{AlertRecord, AssetRecord, EntityRef, IncidentRecord};

/// Repository backed by the shared Postgres pool
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn provenance_json(artifact: &PersistedArtifact) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(&artifact.provenance).map_err(|e| DbError::Serialization(e.to_string()))
}

#[async_trait]
impl EntityStore for PgRepository {
    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_alert(&self, id: Uuid) -> Result<Option<AlertRecord>, DbError> {
        let row: Option<AlertRow> = sqlx::query_as(
            r#"
            SELECT * FROM alerts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AlertRow::into_domain))
    }

    async fn find_incident(&self, id: Uuid) -> Result<Option<IncidentRecord>, DbError> {
        let row: Option<IncidentRow> = sqlx::query_as(
            r#"
            SELECT * FROM incidents WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(IncidentRow::into_domain))
    }

    async fn find_asset(&self, id: Uuid) -> Result<Option<AssetRecord>, DbError> {
        let row: Option<AssetRow> = sqlx::query_as(
            r#"
            SELECT * FROM assets WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AssetRow::into_domain))
    }

    async fn find_alerts(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<AlertRecord>, DbError> {
        let rows: Vec<AlertRow> = sqlx::query_as(
            r#"
            SELECT * FROM alerts
            WHERE organization_id = $1 AND id = ANY($2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AlertRow::into_domain).collect())
    }

    async fn recent_alerts_for_asset(
        &self,
        organization_id: Uuid,
        asset_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AlertRecord>, DbError> {
        let rows: Vec<AlertRow> = sqlx::query_as(
            r#"
            SELECT * FROM alerts
            WHERE organization_id = $1 AND asset_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(organization_id)
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AlertRow::into_domain).collect())
    }

    async fn latest_artifact(
        &self,
        entity: EntityRef,
        kind: AnalysisKind,
    ) -> Result<Option<serde_json::Value>, DbError> {
        let content: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT content FROM analysis_artifacts
            WHERE entity_type = $1 AND entity_id = $2 AND artifact_kind = $3
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(entity.id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(content)
    }
}

#[async_trait]
impl ArtifactSink for PgRepository {
    async fn upsert_artifact(&self, artifact: &PersistedArtifact) -> Result<WriteOutcome, DbError> {
        let provenance = provenance_json(artifact)?;

        // the CTE reads the snapshot taken before the upsert runs
        let row: UpsertRow = sqlx::query_as(
            r#"
            WITH previous AS (
                SELECT content_hash FROM analysis_artifacts
                WHERE entity_type = $3 AND entity_id = $4 AND artifact_kind = $5
            )
            INSERT INTO analysis_artifacts (
                id, organization_id, entity_type, entity_id, artifact_kind,
                content, content_hash, provenance
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (entity_type, entity_id, artifact_kind) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                content = EXCLUDED.content,
                content_hash = EXCLUDED.content_hash,
                provenance = EXCLUDED.provenance,
                updated_at = NOW()
            RETURNING id, (SELECT content_hash FROM previous) AS previous_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artifact.organization_id)
        .bind(artifact.entity.kind.as_str())
        .bind(artifact.entity.id)
        .bind(artifact.kind.as_str())
        .bind(&artifact.content)
        .bind(&artifact.content_hash)
        .bind(&provenance)
        .fetch_one(&self.pool)
        .await?;

        let outcome = row.into_outcome(&artifact.content_hash);
        tracing::debug!(
            entity = %artifact.entity,
            kind = artifact.kind.as_str(),
            record_id = %outcome.record_id,
            "Upserted analysis artifact row"
        );
        Ok(outcome)
    }

    async fn upsert_playbook(
        &self,
        artifact: &PersistedArtifact,
        playbook_type: PlaybookType,
    ) -> Result<WriteOutcome, DbError> {
        let provenance = provenance_json(artifact)?;
        let name = artifact
            .content
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let row: UpsertRow = sqlx::query_as(
            r#"
            WITH previous AS (
                SELECT content_hash FROM playbooks
                WHERE source_alert_id = $3 AND playbook_type = $4
            )
            INSERT INTO playbooks (
                id, organization_id, source_alert_id, playbook_type,
                name, content, content_hash, provenance
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_alert_id, playbook_type) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                name = EXCLUDED.name,
                content = EXCLUDED.content,
                content_hash = EXCLUDED.content_hash,
                provenance = EXCLUDED.provenance,
                updated_at = NOW()
            RETURNING id, (SELECT content_hash FROM previous) AS previous_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artifact.organization_id)
        .bind(artifact.entity.id)
        .bind(playbook_type.as_str())
        .bind(name)
        .bind(&artifact.content)
        .bind(&artifact.content_hash)
        .bind(&provenance)
        .fetch_one(&self.pool)
        .await?;

        let outcome = row.into_outcome(&artifact.content_hash);
        tracing::debug!(
            alert_id = %artifact.entity.id,
            playbook_type = playbook_type.as_str(),
            record_id = %outcome.record_id,
            "Upserted playbook row"
        );
        Ok(outcome)
    }

    async fn append_timeline_event(&self, event: &TimelineEvent) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO timeline_events (
                id, organization_id, entity_type, entity_id, event_type,
                title, description, metadata, user_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.id)
        .bind(event.organization_id)
        .bind(event.entity.kind.as_str())
        .bind(event.entity.id)
        .bind(&event.event_type)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.metadata)
        .bind(event.user_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(id = %event.id, entity = %event.entity, "Appended timeline event");
        Ok(())
    }
}
