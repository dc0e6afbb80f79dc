//! Database rows for source entities and analysis artifacts

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::model::entity::{AlertRecord, AssetRecord, IncidentRecord};

/// Database representation of an alert
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub severity: i32,
    pub source_system: Option<String>,
    pub status: String,
    pub event_time: Option<DateTime<Utc>>,
    pub raw_data: serde_json::Value,
    pub enrichment_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AlertRow {
    pub fn into_domain(self) -> AlertRecord {
        AlertRecord {
            id: self.id,
            organization_id: self.organization_id,
            asset_id: self.asset_id,
            title: self.title,
            description: self.description,
            severity: self.severity,
            source_system: self.source_system,
            status: self.status,
            event_time: self.event_time,
            raw_data: self.raw_data,
            enrichment_data: self.enrichment_data,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: i32,
    pub status: String,
    pub category: Option<String>,
    pub alert_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl IncidentRow {
    pub fn into_domain(self) -> IncidentRecord {
        IncidentRecord {
            id: self.id,
            organization_id: self.organization_id,
            title: self.title,
            description: self.description,
            severity: self.severity,
            status: self.status,
            category: self.category,
            alert_ids: self.alert_ids,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AssetRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub asset_type: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub os_type: Option<String>,
    pub criticality: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AssetRow {
    pub fn into_domain(self) -> AssetRecord {
        AssetRecord {
            id: self.id,
            organization_id: self.organization_id,
            name: self.name,
            asset_type: self.asset_type,
            ip_address: self.ip_address,
            hostname: self.hostname,
            os_type: self.os_type,
            criticality: self.criticality,
            created_at: self.created_at,
        }
    }
}

/// Row returned by artifact and playbook upserts
#[derive(Debug, Clone, FromRow)]
pub struct UpsertRow {
    pub id: Uuid,
    /// Content hash stored before this statement ran; `None` when the row is new
    pub previous_hash: Option<String>,
}

impl UpsertRow {
    pub fn into_outcome(self, content_hash: &str) -> crate::model::artifact::WriteOutcome {
        crate::model::artifact::WriteOutcome {
            record_id: self.id,
            inserted: self.previous_hash.is_none(),
            changed: self.previous_hash.as_deref() != Some(content_hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_row_outcomes() {
        let id = Uuid::new_v4();

        let fresh = UpsertRow { id, previous_hash: None }.into_outcome("abc");
        assert!(fresh.inserted && fresh.changed);

        let same = UpsertRow {
            id,
            previous_hash: Some("abc".to_string()),
        }
        .into_outcome("abc");
        assert!(!same.inserted && !same.changed);

        let updated = UpsertRow {
            id,
            previous_hash: Some("old".to_string()),
        }
        .into_outcome("abc");
        assert!(!updated.inserted && updated.changed);
        assert_eq!(updated.record_id, id);
    }
}
