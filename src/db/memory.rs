//! In-memory store for pipeline tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use super::DbError;
use super::store::{ArtifactSink, EntityStore};
use crate::model::analysis::{AnalysisKind, PlaybookType};
use crate::model::artifact::{PersistedArtifact, TimelineEvent, WriteOutcome};
use crate::model::entity::{AlertRecord, AssetRecord, EntityRef, IncidentRecord};

#[derive(Default)]
pub struct MemoryStore {
    alerts: Mutex<HashMap<Uuid, AlertRecord>>,
    incidents: Mutex<HashMap<Uuid, IncidentRecord>>,
    assets: Mutex<HashMap<Uuid, AssetRecord>>,
    artifacts: Mutex<HashMap<(EntityRef, AnalysisKind), (Uuid, PersistedArtifact)>>,
    playbooks: Mutex<HashMap<(Uuid, PlaybookType), (Uuid, PersistedArtifact)>>,
    timeline: Mutex<Vec<TimelineEvent>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_alert(&self, alert: AlertRecord) {
        self.alerts.lock().unwrap().insert(alert.id, alert);
    }

    pub fn insert_incident(&self, incident: IncidentRecord) {
        self.incidents.lock().unwrap().insert(incident.id, incident);
    }

    pub fn insert_asset(&self, asset: AssetRecord) {
        self.assets.lock().unwrap().insert(asset.id, asset);
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Number of upsert calls received
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }

    pub fn playbooks_for(&self, alert_id: Uuid) -> Vec<(PlaybookType, PersistedArtifact)> {
        self.playbooks
            .lock()
            .unwrap()
            .iter()
            .filter(|((id, _), _)| *id == alert_id)
            .map(|((_, t), (_, artifact))| (*t, artifact.clone()))
            .collect()
    }

    pub fn timeline_events(&self) -> Vec<TimelineEvent> {
        self.timeline.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<(), DbError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Serialization("write rejected by test store".to_string()));
        }
        Ok(())
    }
}

fn upsert<K: std::hash::Hash + Eq>(
    map: &mut HashMap<K, (Uuid, PersistedArtifact)>,
    key: K,
    artifact: &PersistedArtifact,
) -> WriteOutcome {
    match map.get_mut(&key) {
        Some((id, existing)) => {
            let changed = existing.content_hash != artifact.content_hash;
            *existing = artifact.clone();
            WriteOutcome {
                record_id: *id,
                inserted: false,
                changed,
            }
        }
        None => {
            let id = Uuid::new_v4();
            map.insert(key, (id, artifact.clone()));
            WriteOutcome {
                record_id: id,
                inserted: true,
                changed: true,
            }
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn find_alert(&self, id: Uuid) -> Result<Option<AlertRecord>, DbError> {
        Ok(self.alerts.lock().unwrap().get(&id).cloned())
    }

    async fn find_incident(&self, id: Uuid) -> Result<Option<IncidentRecord>, DbError> {
        Ok(self.incidents.lock().unwrap().get(&id).cloned())
    }

    async fn find_asset(&self, id: Uuid) -> Result<Option<AssetRecord>, DbError> {
        Ok(self.assets.lock().unwrap().get(&id).cloned())
    }

    async fn find_alerts(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<AlertRecord>, DbError> {
        let alerts = self.alerts.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| alerts.get(id))
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn recent_alerts_for_asset(
        &self,
        organization_id: Uuid,
        asset_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AlertRecord>, DbError> {
        let mut alerts: Vec<AlertRecord> = self
            .alerts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.organization_id == organization_id && a.asset_id == Some(asset_id))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit.max(0) as usize);
        Ok(alerts)
    }

    async fn latest_artifact(
        &self,
        entity: EntityRef,
        kind: AnalysisKind,
    ) -> Result<Option<serde_json::Value>, DbError> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .get(&(entity, kind))
            .map(|(_, artifact)| artifact.content.clone()))
    }
}

#[async_trait]
impl ArtifactSink for MemoryStore {
    async fn upsert_artifact(&self, artifact: &PersistedArtifact) -> Result<WriteOutcome, DbError> {
        self.check_writable()?;
        let mut artifacts = self.artifacts.lock().unwrap();
        Ok(upsert(&mut artifacts, (artifact.entity, artifact.kind), artifact))
    }

    async fn upsert_playbook(
        &self,
        artifact: &PersistedArtifact,
        playbook_type: PlaybookType,
    ) -> Result<WriteOutcome, DbError> {
        self.check_writable()?;
        let mut playbooks = self.playbooks.lock().unwrap();
        Ok(upsert(&mut playbooks, (artifact.entity.id, playbook_type), artifact))
    }

    async fn append_timeline_event(&self, event: &TimelineEvent) -> Result<(), DbError> {
        self.check_writable()?;
        self.timeline.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Alert with a description that mentions an IP, a hash and a URL
pub fn sample_alert(organization_id: Uuid, asset_id: Option<Uuid>) -> AlertRecord {
    AlertRecord {
        id: Uuid::new_v4(),
        organization_id,
        asset_id,
        title: "Suspicious outbound connection".to_string(),
        description: Some(
            "Host beaconed to 203.0.113.100 and downloaded 44d88612fea8a8f36de82e1278abb02f"
                .to_string(),
        ),
        severity: 4,
        source_system: Some("wazuh".to_string()),
        status: "open".to_string(),
        event_time: None,
        raw_data: serde_json::json!({"rule": {"id": 100200, "level": 12}}),
        enrichment_data: serde_json::json!({}),
        created_at: chrono::Utc::now(),
    }
}

pub fn sample_asset(organization_id: Uuid) -> AssetRecord {
    AssetRecord {
        id: Uuid::new_v4(),
        organization_id,
        name: "web-01".to_string(),
        asset_type: Some("server".to_string()),
        ip_address: Some("10.0.0.12".to_string()),
        hostname: Some("web-01.corp.example".to_string()),
        os_type: Some("linux".to_string()),
        criticality: Some("high".to_string()),
        created_at: chrono::Utc::now(),
    }
}

pub fn sample_incident(organization_id: Uuid, alert_ids: Vec<Uuid>) -> IncidentRecord {
    IncidentRecord {
        id: Uuid::new_v4(),
        organization_id,
        title: "Possible C2 activity on web tier".to_string(),
        description: Some("Multiple hosts contacted a known C2 address".to_string()),
        severity: 4,
        status: "investigating".to_string(),
        category: Some("malware".to_string()),
        alert_ids,
        created_at: chrono::Utc::now(),
    }
}
