//! Persistence and notification sink
//!
//! Merges artifacts into their owning records and appends a timeline event
//! when the stored content actually changed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::db::DbError;
use crate::db::store::ArtifactSink;
use crate::model::artifact::{PersistedArtifact, TimelineEvent, WriteOutcome};

pub const AI_ANALYSIS_EVENT: &str = "ai_analysis";

#[derive(Clone)]
pub struct PersistenceSink {
    sink: Arc<dyn ArtifactSink>,
}

impl PersistenceSink {
    pub fn new(sink: Arc<dyn ArtifactSink>) -> Self {
        Self { sink }
    }

    /// Upsert the artifact and record a timeline event for new or changed content
    pub async fn persist(
        &self,
        artifact: &PersistedArtifact,
        user_id: Option<Uuid>,
        record_timeline: bool,
    ) -> Result<WriteOutcome, DbError> {
        let outcome = match artifact.kind.playbook_type() {
            Some(playbook_type) => self.sink.upsert_playbook(artifact, playbook_type).await?,
            None => self.sink.upsert_artifact(artifact).await?,
        };

        tracing::debug!(
            entity = %artifact.entity,
            kind = artifact.kind.as_str(),
            record_id = %outcome.record_id,
            inserted = outcome.inserted,
            changed = outcome.changed,
            "Upserted analysis artifact"
        );

        if record_timeline && outcome.changed {
            let event = timeline_event(artifact, &outcome, user_id);
            self.sink.append_timeline_event(&event).await?;
        }

        Ok(outcome)
    }
}

fn timeline_event(
    artifact: &PersistedArtifact,
    outcome: &WriteOutcome,
    user_id: Option<Uuid>,
) -> TimelineEvent {
    let verb = if outcome.inserted { "generated" } else { "updated" };
    let provenance = &artifact.provenance;

    TimelineEvent {
        id: Uuid::new_v4(),
        organization_id: artifact.organization_id,
        entity: artifact.entity,
        event_type: AI_ANALYSIS_EVENT.to_string(),
        title: format!("{} {}", capitalized(artifact.kind.display_name()), verb),
        description: format!(
            "{} {} by {} ({}) in {} ms",
            artifact.kind.display_name(),
            verb,
            provenance.provider,
            provenance.model_id,
            provenance.processing_time_ms
        ),
        metadata: json!({
            "kind": artifact.kind.as_str(),
            "provider": provenance.provider,
            "modelId": provenance.model_id,
            "processingTimeMs": provenance.processing_time_ms,
            "confidence": provenance.confidence,
            "contentHash": artifact.content_hash,
            "recordId": outcome.record_id,
        }),
        user_id,
        created_at: Utc::now(),
    }
}

fn capitalized(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::model::analysis::{AnalysisKind, PlaybookType};
    use crate::model::artifact::Provenance;
    use crate::model::entity::EntityRef;

    fn artifact(entity: EntityRef, kind: AnalysisKind, content: serde_json::Value) -> PersistedArtifact {
        let provenance = Provenance::new("scripted", "scripted-model", 42, Some(80.0), "prompt");
        PersistedArtifact::new(Uuid::new_v4(), entity, kind, content, provenance)
    }

    #[tokio::test]
    async fn test_identical_rerun_records_one_event() {
        let store = Arc::new(MemoryStore::new());
        let sink = PersistenceSink::new(store.clone());
        let entity = EntityRef::alert(Uuid::new_v4());
        let a = artifact(entity, AnalysisKind::AlertAnalysis, json!({"summary": "x"}));

        let first = sink.persist(&a, None, true).await.unwrap();
        let second = sink.persist(&a, None, true).await.unwrap();

        assert!(first.inserted && first.changed);
        assert!(!second.inserted && !second.changed);
        assert_eq!(first.record_id, second.record_id);
        assert_eq!(store.artifact_count(), 1);

        let events = store.timeline_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AI_ANALYSIS_EVENT);
        assert_eq!(events[0].title, "AI alert analysis generated");
        assert_eq!(events[0].metadata["contentHash"], json!(a.content_hash));
    }

    #[tokio::test]
    async fn test_changed_content_is_updated_event() {
        let store = Arc::new(MemoryStore::new());
        let sink = PersistenceSink::new(store.clone());
        let entity = EntityRef::incident(Uuid::new_v4());

        sink.persist(&artifact(entity, AnalysisKind::Timeline, json!({"events": []})), None, true)
            .await
            .unwrap();
        let outcome = sink
            .persist(
                &artifact(entity, AnalysisKind::Timeline, json!({"events": [{"description": "x"}]})),
                None,
                true,
            )
            .await
            .unwrap();

        assert!(outcome.changed);
        let events = store.timeline_events();
        assert_eq!(events.len(), 2);
        assert!(events[1].title.ends_with("updated"));
    }

    #[tokio::test]
    async fn test_timeline_can_be_disabled() {
        let store = Arc::new(MemoryStore::new());
        let sink = PersistenceSink::new(store.clone());
        let a = artifact(
            EntityRef::alert(Uuid::new_v4()),
            AnalysisKind::Classification,
            json!({"securityEventType": "malware_infection"}),
        );

        sink.persist(&a, None, false).await.unwrap();
        assert_eq!(store.artifact_count(), 1);
        assert!(store.timeline_events().is_empty());
    }

    #[tokio::test]
    async fn test_playbooks_are_keyed_by_type() {
        let store = Arc::new(MemoryStore::new());
        let sink = PersistenceSink::new(store.clone());
        let alert_id = Uuid::new_v4();
        let entity = EntityRef::alert(alert_id);

        sink.persist(
            &artifact(entity, AnalysisKind::ImmediateActionPlaybook, json!({"name": "a"})),
            None,
            true,
        )
        .await
        .unwrap();
        sink.persist(
            &artifact(entity, AnalysisKind::InvestigationPlaybook, json!({"name": "b"})),
            None,
            true,
        )
        .await
        .unwrap();

        let mut types: Vec<_> = store.playbooks_for(alert_id).into_iter().map(|(t, _)| t).collect();
        types.sort_by_key(|t| t.as_str());
        assert_eq!(types, vec![PlaybookType::ImmediateAction, PlaybookType::Investigation]);
        assert_eq!(store.artifact_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes();
        let sink = PersistenceSink::new(store.clone());
        let a = artifact(EntityRef::alert(Uuid::new_v4()), AnalysisKind::AlertAnalysis, json!({}));

        assert!(sink.persist(&a, None, true).await.is_err());
        assert!(store.timeline_events().is_empty());
    }
}
