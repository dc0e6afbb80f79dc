//! Source entities the pipeline analyzes
//!
//! These mirror the rows owned by the surrounding OpenSOC backend. The pipeline
//! only reads them; analysis output is stored in separate artifact records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of record an analysis can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Alert,
    Incident,
    Asset,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Alert => "alert",
            EntityKind::Incident => "incident",
            EntityKind::Asset => "asset",
        }
    }

    /// Parse the plural path segment used by the HTTP API (`alerts`, `incidents`, `assets`)
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "alerts" => Some(EntityKind::Alert),
            "incidents" => Some(EntityKind::Incident),
            "assets" => Some(EntityKind::Asset),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a source entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn alert(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Alert,
            id,
        }
    }

    pub fn incident(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Incident,
            id,
        }
    }

    pub fn asset(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Asset,
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Security alert as stored by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    /// Severity on the backend's 1 (informational) to 5 (critical) scale
    pub severity: i32,
    pub source_system: Option<String>,
    pub status: String,
    pub event_time: Option<DateTime<Utc>>,
    pub raw_data: serde_json::Value,
    pub enrichment_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Security incident as stored by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
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

/// Asset inventory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
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

/// Label for the backend's numeric severity scale
pub fn severity_label(severity: i32) -> &'static str {
    match severity {
        i32::MIN..=1 => "informational",
        2 => "low",
        3 => "medium",
        4 => "high",
        _ => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(severity_label(1), "informational");
        assert_eq!(severity_label(3), "medium");
        assert_eq!(severity_label(4), "high");
        assert_eq!(severity_label(5), "critical");
        assert_eq!(severity_label(9), "critical");
    }

    #[test]
    fn test_entity_kind_path_segments() {
        assert_eq!(EntityKind::from_path_segment("alerts"), Some(EntityKind::Alert));
        assert_eq!(EntityKind::from_path_segment("assets"), Some(EntityKind::Asset));
        assert_eq!(EntityKind::from_path_segment("cases"), None);
    }
}
