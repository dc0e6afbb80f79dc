//! Persisted analysis artifacts, provenance metadata and timeline events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::analysis::AnalysisKind;
use super::entity::EntityRef;

/// Audit metadata attached to every generated artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub generated_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub provider: String,
    /// Model reported by the provider, or the configured model name when it reports none
    pub model_id: String,
    pub confidence: Option<f64>,
    /// SHA-256 of the rendered prompt
    pub prompt_digest: String,
}

impl Provenance {
    pub fn new(
        provider: &str,
        model_id: &str,
        processing_time_ms: u64,
        confidence: Option<f64>,
        prompt: &str,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            processing_time_ms,
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            confidence,
            prompt_digest: sha256_hex(prompt.as_bytes()),
        }
    }
}

/// Normalized result merged into its owning record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedArtifact {
    pub organization_id: Uuid,
    pub entity: EntityRef,
    pub kind: AnalysisKind,
    pub content: serde_json::Value,
    pub content_hash: String,
    pub provenance: Provenance,
}

impl PersistedArtifact {
    pub fn new(
        organization_id: Uuid,
        entity: EntityRef,
        kind: AnalysisKind,
        content: serde_json::Value,
        provenance: Provenance,
    ) -> Self {
        let content_hash = content_digest(&content);
        Self {
            organization_id,
            entity,
            kind,
            content,
            content_hash,
            provenance,
        }
    }
}

/// Result of an upsert against the owning record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub record_id: Uuid,
    /// No record existed for this key before the write
    pub inserted: bool,
    /// Stored content differs from what was there before
    pub changed: bool,
}

/// Audit entry describing a change to a record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub entity: EntityRef,
    pub event_type: String,
    pub title: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Stable digest of a JSON value; object keys serialize in sorted order
pub fn content_digest(content: &serde_json::Value) -> String {
    sha256_hex(content.to_string().as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_digest_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": [1, 2]}"#).unwrap();
        let b = json!({"a": [1, 2], "b": 1});
        assert_eq!(content_digest(&a), content_digest(&b));
        assert_ne!(content_digest(&a), content_digest(&json!({"a": [2, 1], "b": 1})));
    }

    #[test]
    fn test_provenance_digests_prompt() {
        let p1 = Provenance::new("ollama", "llama3.1", 12, Some(80.0), "prompt");
        let p2 = Provenance::new("ollama", "llama3.1", 30, None, "prompt");
        assert_eq!(p1.prompt_digest, p2.prompt_digest);
        assert_eq!(p1.prompt_digest.len(), 64);
    }
}
