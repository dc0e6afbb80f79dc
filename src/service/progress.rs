//! Progress feed for running analyses
//!
//! Events are best effort: nothing listens by default and dropped events
//! never affect a pipeline run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::analysis::AnalysisKind;
use crate::model::request::AnalysisRequest;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Context,
    Prompt,
    Completion,
    Extraction,
    Normalization,
    Persistence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub request_id: Uuid,
    /// Organization that owns the analysed entity
    pub organization_id: Uuid,
    #[schema(value_type = String)]
    pub entity: String,
    #[schema(value_type = String)]
    pub kind: AnalysisKind,
    pub stage: Stage,
    pub status: StageStatus,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// Broadcasts [`ProgressEvent`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct ProgressNotifier {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn emit(
        &self,
        request: &AnalysisRequest,
        kind: AnalysisKind,
        stage: Stage,
        status: StageStatus,
        message: Option<String>,
    ) {
        let event = ProgressEvent {
            request_id: request.request_id,
            organization_id: request.organization_id,
            entity: request.source.to_string(),
            kind,
            stage,
            status,
            message,
            at: Utc::now(),
        };
        // An error only means there are no subscribers right now
        let _ = self.sender.send(event);
    }
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
