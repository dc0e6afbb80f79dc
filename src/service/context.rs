//! Context builder
//!
//! Loads the source entity and its related rows and turns them into a
//! [`PromptContext`]. Optional IOC enrichment adds VirusTotal verdicts for
//! indicators found in the collected text; threat hunts always carry them,
//! together with an aggregate threat score.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use thiserror::Error;

use crate::db::DbError;
use crate::db::store::EntityStore;
use crate::model::analysis::AnalysisKind;
use crate::model::context::{PromptContext, PromptContextBuilder};
use crate::model::entity::{
    AlertRecord, AssetRecord, EntityKind, EntityRef, IncidentRecord, severity_label,
};
use crate::model::ioc::{IocReputation, ThreatScore, extract_iocs};
use crate::model::request::{AnalysisRequest, ValidationError};
use crate::service::analysis::error::PipelineError;
use crate::service::virustotal::ReputationLookup;

/// Indicators looked up per request at most
const MAX_ENRICHED_IOCS: usize = 5;
const MAX_HUNTED_IOCS: usize = 10;
const RECENT_ALERTS_LIMIT: i64 = 10;

/// The source entity could not be loaded for the caller
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LookupError {
    #[error("{0} not found")]
    NotFound(EntityRef),

    #[error("{0} belongs to another organization")]
    Forbidden(EntityRef),

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Builds prompt context for analysis requests
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn EntityStore>,
    reputation: Option<Arc<dyn ReputationLookup>>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            reputation: None,
        }
    }

    pub fn with_reputation(mut self, reputation: Arc<dyn ReputationLookup>) -> Self {
        self.reputation = Some(reputation);
        self
    }

    /// Reject enrichment requests that cannot be served
    pub fn check_enrichment(
        &self,
        request: &AnalysisRequest,
        kind: AnalysisKind,
    ) -> Result<(), ValidationError> {
        if self.reputation.is_some() {
            return Ok(());
        }
        if kind.requires_threat_intel() {
            return Err(ValidationError(format!(
                "{} requires a configured VirusTotal API key",
                kind
            )));
        }
        if request.options.enrich_iocs {
            return Err(ValidationError(
                "enrichIocs requires a configured VirusTotal API key".to_string(),
            ));
        }
        Ok(())
    }

    /// Assemble the context for one request
    pub async fn build(
        &self,
        request: &AnalysisRequest,
        kind: AnalysisKind,
    ) -> Result<PromptContext, PipelineError> {
        let start = Instant::now();
        let source = request.source;
        let mut builder = PromptContext::builder(source);

        match source.kind {
            EntityKind::Alert => {
                let alert = self.load_alert(source, request.organization_id).await?;
                self.alert_sections(&mut builder, &alert, kind).await?;
            }
            EntityKind::Incident => {
                let incident = self.load_incident(source, request.organization_id).await?;
                self.incident_sections(&mut builder, &incident, kind).await?;
            }
            EntityKind::Asset => {
                let asset = self.load_asset(source, request.organization_id).await?;
                self.asset_sections(&mut builder, &asset, kind).await?;
            }
        }

        if kind.requires_threat_intel() {
            self.add_threat_intel(&mut builder).await?;
        } else if request.options.enrich_iocs {
            self.enrich(&mut builder).await?;
        }

        let context = builder.build();
        tracing::debug!(
            entity = %source,
            kind = kind.as_str(),
            sections = context.sections().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built prompt context"
        );

        Ok(context)
    }

    async fn load_alert(
        &self,
        source: EntityRef,
        organization_id: uuid::Uuid,
    ) -> Result<AlertRecord, LookupError> {
        let alert = self
            .store
            .find_alert(source.id)
            .await?
            .ok_or(LookupError::NotFound(source))?;
        check_owner(source, alert.organization_id, organization_id)?;
        Ok(alert)
    }

    async fn load_incident(
        &self,
        source: EntityRef,
        organization_id: uuid::Uuid,
    ) -> Result<IncidentRecord, LookupError> {
        let incident = self
            .store
            .find_incident(source.id)
            .await?
            .ok_or(LookupError::NotFound(source))?;
        check_owner(source, incident.organization_id, organization_id)?;
        Ok(incident)
    }

    async fn load_asset(
        &self,
        source: EntityRef,
        organization_id: uuid::Uuid,
    ) -> Result<AssetRecord, LookupError> {
        let asset = self
            .store
            .find_asset(source.id)
            .await?
            .ok_or(LookupError::NotFound(source))?;
        check_owner(source, asset.organization_id, organization_id)?;
        Ok(asset)
    }

    async fn alert_sections(
        &self,
        builder: &mut PromptContextBuilder,
        alert: &AlertRecord,
        kind: AnalysisKind,
    ) -> Result<(), LookupError> {
        add_alert(builder, "Alert", alert);

        if let Some(asset_id) = alert.asset_id
            && let Some(asset) = self.store.find_asset(asset_id).await?
            && asset.organization_id == alert.organization_id
        {
            add_asset(builder, "Affected Asset", &asset);
        }

        if kind == AnalysisKind::LogAnalysis {
            add_log_entry(builder, 1, alert);
        }

        if kind != AnalysisKind::AlertAnalysis {
            self.add_prior(builder, EntityRef::alert(alert.id), AnalysisKind::AlertAnalysis)
                .await?;
        }
        Ok(())
    }

    async fn incident_sections(
        &self,
        builder: &mut PromptContextBuilder,
        incident: &IncidentRecord,
        kind: AnalysisKind,
    ) -> Result<(), LookupError> {
        builder
            .field("Incident", "Title", incident.title.as_str())
            .optional_field("Incident", "Description", incident.description.as_ref())
            .field("Incident", "Severity", severity_text(incident.severity))
            .field("Incident", "Status", incident.status.as_str())
            .optional_field("Incident", "Category", incident.category.as_ref())
            .field("Incident", "Opened At", incident.created_at.to_rfc3339());

        if !incident.alert_ids.is_empty() {
            let alerts = self
                .store
                .find_alerts(incident.organization_id, &incident.alert_ids)
                .await?;
            for (index, alert) in alerts.iter().enumerate() {
                builder.field(
                    "Linked Alerts",
                    &format!("Alert {}", index + 1),
                    alert_line(alert),
                );
            }
        }

        if kind != AnalysisKind::IncidentForm {
            self.add_prior(
                builder,
                EntityRef::incident(incident.id),
                AnalysisKind::IncidentForm,
            )
            .await?;
        }
        Ok(())
    }

    async fn asset_sections(
        &self,
        builder: &mut PromptContextBuilder,
        asset: &AssetRecord,
        kind: AnalysisKind,
    ) -> Result<(), LookupError> {
        add_asset(builder, "Asset", asset);

        let alerts = self
            .store
            .recent_alerts_for_asset(asset.organization_id, asset.id, RECENT_ALERTS_LIMIT)
            .await?;
        for (index, alert) in alerts.iter().enumerate() {
            builder.field(
                "Recent Alerts",
                &format!("Alert {}", index + 1),
                alert_line(alert),
            );
            if kind == AnalysisKind::LogAnalysis {
                add_log_entry(builder, index + 1, alert);
            }
        }
        Ok(())
    }

    async fn add_prior(
        &self,
        builder: &mut PromptContextBuilder,
        entity: EntityRef,
        prior: AnalysisKind,
    ) -> Result<(), LookupError> {
        if let Some(content) = self.store.latest_artifact(entity, prior).await? {
            builder.json_field("Prior Analysis", prior.display_name(), &content);
        }
        Ok(())
    }

    async fn enrich(&self, builder: &mut PromptContextBuilder) -> Result<(), PipelineError> {
        for verdict in self.lookup_iocs(builder, MAX_ENRICHED_IOCS).await? {
            builder.field(
                "IOC Reputation",
                verdict.ioc_type.as_str(),
                verdict.summary_line(),
            );
        }
        Ok(())
    }

    async fn add_threat_intel(
        &self,
        builder: &mut PromptContextBuilder,
    ) -> Result<(), PipelineError> {
        let verdicts = self.lookup_iocs(builder, MAX_HUNTED_IOCS).await?;
        if verdicts.is_empty() {
            builder.field("Threat Intelligence", "Indicators", "no indicators found in context");
            return Ok(());
        }

        for (index, verdict) in verdicts.iter().enumerate() {
            builder.field(
                "Threat Intelligence",
                &format!("Indicator {}", index + 1),
                verdict.summary_line(),
            );
        }

        let score = ThreatScore::from_reputations(&verdicts);
        builder
            .field(
                "Threat Intelligence",
                "Threat Score",
                format!(
                    "{:.1} ({} of {} indicators flagged)",
                    score.percentage(),
                    score.flagged,
                    score.total
                ),
            )
            .field("Threat Intelligence", "Threat Level", score.level());
        Ok(())
    }

    /// Reputation verdicts for the first `limit` indicators in the context so far
    async fn lookup_iocs(
        &self,
        builder: &PromptContextBuilder,
        limit: usize,
    ) -> Result<Vec<IocReputation>, PipelineError> {
        let Some(reputation) = self.reputation.as_ref() else {
            return Ok(Vec::new());
        };

        let iocs: Vec<_> = extract_iocs(&builder.text()).into_iter().take(limit).collect();
        if iocs.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(count = iocs.len(), "Looking up IOC reputation for context");

        let lookups = iocs.iter().map(|(_, value)| reputation.lookup(value));
        let mut verdicts = Vec::with_capacity(iocs.len());
        for result in join_all(lookups).await {
            verdicts.push(result?);
        }
        Ok(verdicts)
    }
}

fn check_owner(source: EntityRef, owner: uuid::Uuid, caller: uuid::Uuid) -> Result<(), LookupError> {
    if owner != caller {
        tracing::warn!(entity = %source, "Rejected cross-organization access");
        return Err(LookupError::Forbidden(source));
    }
    Ok(())
}

fn severity_text(severity: i32) -> String {
    format!("{} ({})", severity, severity_label(severity))
}

fn alert_line(alert: &AlertRecord) -> String {
    format!(
        "{} (severity {}, status {})",
        alert.title,
        severity_text(alert.severity),
        alert.status
    )
}

fn add_alert(builder: &mut PromptContextBuilder, section: &str, alert: &AlertRecord) {
    builder
        .field(section, "Title", alert.title.as_str())
        .optional_field(section, "Description", alert.description.as_ref())
        .field(section, "Severity", severity_text(alert.severity))
        .optional_field(section, "Source System", alert.source_system.as_ref())
        .field(section, "Status", alert.status.as_str())
        .optional_field(section, "Event Time", alert.event_time.map(|t| t.to_rfc3339()))
        .json_field(section, "Raw Data", &alert.raw_data)
        .json_field(section, "Enrichment Data", &alert.enrichment_data);
}

fn add_log_entry(builder: &mut PromptContextBuilder, index: usize, alert: &AlertRecord) {
    let source = alert.source_system.as_deref().unwrap_or("unknown source");
    let label = match alert.event_time {
        Some(time) => format!("Entry {} ({}, {})", index, time.to_rfc3339(), source),
        None => format!("Entry {} ({})", index, source),
    };
    builder.json_field("Log Entries", &label, &alert.raw_data);
}

fn add_asset(builder: &mut PromptContextBuilder, section: &str, asset: &AssetRecord) {
    builder
        .field(section, "Name", asset.name.as_str())
        .optional_field(section, "Type", asset.asset_type.as_ref())
        .optional_field(section, "IP Address", asset.ip_address.as_ref())
        .optional_field(section, "Hostname", asset.hostname.as_ref())
        .optional_field(section, "Operating System", asset.os_type.as_ref())
        .optional_field(section, "Criticality", asset.criticality.as_ref());
}
