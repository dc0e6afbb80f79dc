//! Storage seams used by the analysis pipeline

use async_trait::async_trait;
use uuid::Uuid;

use super::DbError;
use crate::model::analysis::{AnalysisKind, PlaybookType};
use crate::model::artifact::{PersistedArtifact, TimelineEvent, WriteOutcome};
use crate::model::entity::{AlertRecord, AssetRecord, EntityRef, IncidentRecord};

/// Read access to source entities and earlier analysis
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Round trip to the backing store
    async fn ping(&self) -> Result<(), DbError>;

    async fn find_alert(&self, id: Uuid) -> Result<Option<AlertRecord>, DbError>;

    async fn find_incident(&self, id: Uuid) -> Result<Option<IncidentRecord>, DbError>;

    async fn find_asset(&self, id: Uuid) -> Result<Option<AssetRecord>, DbError>;

    /// Alerts with the given ids that belong to the organization
    async fn find_alerts(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<AlertRecord>, DbError>;

    /// Most recent alerts raised against an asset, newest first
    async fn recent_alerts_for_asset(
        &self,
        organization_id: Uuid,
        asset_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AlertRecord>, DbError>;

    /// Content of the stored artifact of `kind` for an entity, if any
    async fn latest_artifact(
        &self,
        entity: EntityRef,
        kind: AnalysisKind,
    ) -> Result<Option<serde_json::Value>, DbError>;
}

/// Write access for analysis results
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Insert or replace the artifact keyed by (entity, kind)
    async fn upsert_artifact(&self, artifact: &PersistedArtifact) -> Result<WriteOutcome, DbError>;

    /// Insert or replace the playbook keyed by (source alert, playbook type)
    async fn upsert_playbook(
        &self,
        artifact: &PersistedArtifact,
        playbook_type: PlaybookType,
    ) -> Result<WriteOutcome, DbError>;

    async fn append_timeline_event(&self, event: &TimelineEvent) -> Result<(), DbError>;
}
