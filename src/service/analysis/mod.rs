//! AI analysis pipeline
//!
//! Runs one structured analysis end to end: context, prompt, completion,
//! extraction, normalization and persistence. Every kind goes through the same
//! path; the per-kind schema table drives prompt rules and normalization.

use std::fmt::Display;
use std::time::Instant;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::analysis::{AnalysisKind, AnalysisResult, PlaybookType};
use crate::model::artifact::{PersistedArtifact, Provenance};
use crate::model::config::PipelineConfig;
use crate::model::request::AnalysisRequest;
use crate::service::context::ContextBuilder;
use crate::service::llm::LlmClient;
use crate::service::progress::{ProgressNotifier, Stage, StageStatus};
use crate::service::sink::PersistenceSink;

pub mod converters;
pub mod error;
pub mod extraction;
pub mod normalize;
pub mod prompts;
pub mod schema;
pub mod validation;

pub use error::{ParseError, PipelineError};

use converters::convert_result;
use extraction::extract_object;
use normalize::normalize;
use prompts::render;
use schema::schema_for;
use validation::validate_result;

/// Result of one successful pipeline run
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub request_id: Uuid,
    #[schema(value_type = String)]
    pub kind: AnalysisKind,
    /// Id of the record the artifact was merged into
    pub record_id: Uuid,
    pub inserted: bool,
    pub changed: bool,
    /// Normalized object as stored
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
    #[schema(value_type = Object)]
    pub result: AnalysisResult,
    #[schema(value_type = Object)]
    pub provenance: Provenance,
    /// Quality warnings that did not reject the result
    pub warnings: Vec<String>,
}

/// Both playbooks generated for one alert
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookBundle {
    pub immediate_action: AnalysisOutcome,
    pub investigation: AnalysisOutcome,
}

/// Orchestrates a single analysis from source entity to stored artifact
#[derive(Clone)]
pub struct AnalysisPipeline {
    context: ContextBuilder,
    llm: LlmClient,
    sink: PersistenceSink,
    progress: ProgressNotifier,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(
        context: ContextBuilder,
        llm: LlmClient,
        sink: PersistenceSink,
        progress: ProgressNotifier,
        config: PipelineConfig,
    ) -> Self {
        Self {
            context,
            llm,
            sink,
            progress,
            config,
        }
    }

    pub fn progress(&self) -> &ProgressNotifier {
        &self.progress
    }

    /// Run one analysis of `kind` for the request's source entity
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        kind: AnalysisKind,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let start = Instant::now();

        tracing::debug!(
            request_id = %request.request_id,
            entity = %request.source,
            kind = kind.as_str(),
            "Starting analysis"
        );

        let outcome = self.execute(request, kind).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &outcome {
            Ok(o) => tracing::info!(
                request_id = %request.request_id,
                entity = %request.source,
                kind = kind.as_str(),
                record_id = %o.record_id,
                changed = o.changed,
                elapsed_ms = elapsed_ms,
                "Analysis completed successfully"
            ),
            Err(e) => tracing::error!(
                request_id = %request.request_id,
                entity = %request.source,
                kind = kind.as_str(),
                error_type = e.error_type(),
                error = %e,
                elapsed_ms = elapsed_ms,
                "Analysis failed"
            ),
        }

        outcome
    }

    /// Generate the immediate-action and investigation playbooks for an alert concurrently
    ///
    /// Fails if either run fails; a playbook that was already stored stays stored.
    pub async fn generate_playbooks(
        &self,
        request: &AnalysisRequest,
    ) -> Result<PlaybookBundle, PipelineError> {
        let (immediate_action, investigation) = futures::future::join(
            self.run(request, PlaybookType::ImmediateAction.analysis_kind()),
            self.run(request, PlaybookType::Investigation.analysis_kind()),
        )
        .await;

        Ok(PlaybookBundle {
            immediate_action: immediate_action?,
            investigation: investigation?,
        })
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        kind: AnalysisKind,
    ) -> Result<AnalysisOutcome, PipelineError> {
        // everything the caller controls is checked before any store or network call
        request.validate_for(kind)?;
        self.context.check_enrichment(request, kind)?;

        self.started(request, kind, Stage::Context);
        let context = self.context.build(request, kind).await;
        let context = self.finished(request, kind, Stage::Context, context)?;

        self.started(request, kind, Stage::Prompt);
        let rendered = render(kind, &context);
        self.finished::<_, PipelineError>(request, kind, Stage::Prompt, Ok(()))?;

        self.started(request, kind, Stage::Completion);
        let completion_request = self.llm.request(
            rendered.system,
            &rendered.user,
            &request.options,
            self.config.timeout_for(kind),
        );
        let completion = self.llm.complete(&completion_request).await;
        let completion = self.finished(request, kind, Stage::Completion, completion)?;

        self.started(request, kind, Stage::Extraction);
        let extracted = extract_object(&completion.text, schema_for(kind).marker);
        let extracted = self.finished(request, kind, Stage::Extraction, extracted)?;

        self.started(request, kind, Stage::Normalization);
        let normalized = self.normalize_and_check(kind, &extracted);
        let (normalized, result, warnings) =
            self.finished(request, kind, Stage::Normalization, normalized)?;

        for warning in &warnings {
            tracing::warn!(
                request_id = %request.request_id,
                kind = kind.as_str(),
                warning = %warning,
                "Analysis result quality warning"
            );
        }

        self.started(request, kind, Stage::Persistence);
        let provenance = Provenance::new(
            &completion.provider,
            &completion.model_id,
            completion.elapsed_ms,
            result.confidence(),
            &rendered.user,
        );
        let artifact = PersistedArtifact::new(
            request.organization_id,
            request.source,
            kind,
            serde_json::Value::Object(normalized),
            provenance,
        );
        let record_timeline = request
            .options
            .record_timeline
            .unwrap_or(self.config.record_timeline);
        let written = self
            .sink
            .persist(&artifact, request.user_id, record_timeline)
            .await
            .map_err(PipelineError::Persistence);
        let written = self.finished(request, kind, Stage::Persistence, written)?;

        Ok(AnalysisOutcome {
            request_id: request.request_id,
            kind,
            record_id: written.record_id,
            inserted: written.inserted,
            changed: written.changed,
            content: artifact.content,
            result,
            provenance: artifact.provenance,
            warnings,
        })
    }

    fn normalize_and_check(
        &self,
        kind: AnalysisKind,
        extracted: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<
        (
            serde_json::Map<String, serde_json::Value>,
            AnalysisResult,
            Vec<String>,
        ),
        ParseError,
    > {
        let normalized = normalize(kind, extracted)?;
        let result = convert_result(kind, &normalized)?;

        let validation = validate_result(&result);
        if !validation.is_valid {
            return Err(ParseError::Constraint(validation.errors));
        }

        Ok((normalized, result, validation.warnings))
    }

    fn started(&self, request: &AnalysisRequest, kind: AnalysisKind, stage: Stage) {
        self.progress.emit(request, kind, stage, StageStatus::Started, None);
    }

    /// Report the stage outcome and convert its error
    fn finished<T, E>(
        &self,
        request: &AnalysisRequest,
        kind: AnalysisKind,
        stage: Stage,
        result: Result<T, E>,
    ) -> Result<T, PipelineError>
    where
        E: Display + Into<PipelineError>,
    {
        let (status, message) = match &result {
            Ok(_) => (StageStatus::Completed, None),
            Err(e) => (StageStatus::Failed, Some(e.to_string())),
        };
        self.progress.emit(request, kind, stage, status, message);
        result.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::memory::{MemoryStore, sample_alert, sample_incident};
    use crate::model::config::LlmConfig;
    use crate::model::entity::{AlertRecord, EntityRef};
    use crate::model::request::AnalysisOptions;
    use crate::service::context::LookupError;
    use crate::service::llm::ProviderError;
    use crate::service::llm::testing::ScriptedProvider;

    const PLAYBOOK_REPLY: &str = r#"Here is the playbook:
```json
{
  "name": "Contain suspicious beacon",
  "steps": [
    {"name": "Isolate host", "type": "automated", "timeout": 120},
    {"name": "Block destination IP"}
  ]
}
```"#;

    struct Harness {
        store: Arc<MemoryStore>,
        provider: Arc<ScriptedProvider>,
        pipeline: AnalysisPipeline,
        org: Uuid,
        alert: AlertRecord,
    }

    impl Harness {
        fn new(provider: ScriptedProvider) -> Self {
            let org = Uuid::new_v4();
            let store = Arc::new(MemoryStore::new());
            let alert = AlertRecord {
                title: "Suspicious login".to_string(),
                description: None,
                ..sample_alert(org, None)
            };
            store.insert_alert(alert.clone());

            let provider = Arc::new(provider);
            let pipeline = AnalysisPipeline::new(
                ContextBuilder::new(store.clone()),
                LlmClient::with_provider(provider.clone(), &LlmConfig::default()),
                PersistenceSink::new(store.clone()),
                ProgressNotifier::default(),
                PipelineConfig::default(),
            );

            Self {
                store,
                provider,
                pipeline,
                org,
                alert,
            }
        }

        fn alert_request(&self) -> AnalysisRequest {
            AnalysisRequest::new(EntityRef::alert(self.alert.id), self.org, None)
        }
    }

    #[tokio::test]
    async fn test_classification_fills_documented_defaults() {
        let reply = "Classification below.\n```json\n{\"securityEventType\":\"unauthorized_access\",\"eventTags\":[]}\n```";
        let harness = Harness::new(ScriptedProvider::always(reply));

        let outcome = harness
            .pipeline
            .run(&harness.alert_request(), AnalysisKind::Classification)
            .await
            .unwrap();

        assert_eq!(outcome.content["correlationPotential"], "medium");
        assert_eq!(outcome.content["overallConfidence"], 75.0);
        assert_eq!(outcome.content["severityLevel"], "medium");
        assert!(outcome.inserted);
        assert_eq!(outcome.provenance.provider, "scripted");
        assert_eq!(outcome.provenance.confidence, Some(75.0));
        assert_eq!(harness.store.artifact_count(), 1);

        let prompts = harness.provider.prompts();
        assert!(prompts[0].contains("- Title: Suspicious login"));
        assert!(prompts[0].contains("- Severity: 4 (high)"));
    }

    #[tokio::test]
    async fn test_reply_without_json_never_writes() {
        let harness = Harness::new(ScriptedProvider::always(
            "I am unable to classify this alert at the moment.",
        ));

        let err = harness
            .pipeline
            .run(&harness.alert_request(), AnalysisKind::Classification)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Parse(ParseError::NoJsonFound)));
        assert_eq!(harness.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_never_writes() {
        let harness = Harness::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout(60))]));

        let err = harness
            .pipeline
            .run(&harness.alert_request(), AnalysisKind::AlertAnalysis)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Provider(ProviderError::Timeout(60))));
        assert_eq!(harness.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_playbooks_persist_as_two_linked_records() {
        let harness = Harness::new(ScriptedProvider::always(PLAYBOOK_REPLY));

        let bundle = harness
            .pipeline
            .generate_playbooks(&harness.alert_request())
            .await
            .unwrap();

        assert_ne!(bundle.immediate_action.record_id, bundle.investigation.record_id);
        assert_eq!(harness.provider.calls(), 2);

        let stored = harness.store.playbooks_for(harness.alert.id);
        assert_eq!(stored.len(), 2);
        for (_, artifact) in &stored {
            assert_eq!(artifact.entity, EntityRef::alert(harness.alert.id));
            assert_eq!(artifact.content["estimatedTime"], 420);
            assert_eq!(artifact.content["steps"][1]["id"], "step-2");
        }
    }

    #[tokio::test]
    async fn test_one_failed_playbook_fails_the_bundle() {
        let harness = Harness::new(ScriptedProvider::new(vec![
            Ok(PLAYBOOK_REPLY.to_string()),
            Err(ProviderError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
        ]));

        let err = harness
            .pipeline
            .generate_playbooks(&harness.alert_request())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Provider(_)));
        assert_eq!(harness.store.playbooks_for(harness.alert.id).len(), 1);
    }

    #[tokio::test]
    async fn test_identical_rerun_overwrites() {
        let reply = r#"{"summary": "Brute force from a single source", "riskLevel": "High", "isLikelyFalsePositive": false}"#;
        let harness = Harness::new(ScriptedProvider::always(reply));
        let request = harness.alert_request();

        let first = harness
            .pipeline
            .run(&request, AnalysisKind::AlertAnalysis)
            .await
            .unwrap();
        let second = harness
            .pipeline
            .run(&request, AnalysisKind::AlertAnalysis)
            .await
            .unwrap();

        assert_eq!(first.record_id, second.record_id);
        assert!(!second.changed);
        assert_eq!(harness.store.artifact_count(), 1);
        assert_eq!(harness.store.timeline_events().len(), 1);
        assert!(second.warnings.iter().any(|w| w.contains("key findings")));
    }

    #[tokio::test]
    async fn test_inapplicable_kind_is_rejected_before_provider_call() {
        let harness = Harness::new(ScriptedProvider::always("{}"));
        let incident = sample_incident(harness.org, vec![harness.alert.id]);
        harness.store.insert_incident(incident.clone());
        let request = AnalysisRequest::new(EntityRef::incident(incident.id), harness.org, None);

        let err = harness
            .pipeline
            .run(&request, AnalysisKind::Classification)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(harness.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_enrichment_without_virustotal_is_validation_error() {
        let harness = Harness::new(ScriptedProvider::always("{}"));
        let request = harness.alert_request().with_options(AnalysisOptions {
            enrich_iocs: true,
            ..Default::default()
        });

        let err = harness
            .pipeline
            .run(&request, AnalysisKind::AlertAnalysis)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(harness.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_foreign_alert_is_forbidden() {
        let harness = Harness::new(ScriptedProvider::always("{}"));
        let request = AnalysisRequest::new(EntityRef::alert(harness.alert.id), Uuid::new_v4(), None);

        let err = harness
            .pipeline
            .run(&request, AnalysisKind::AlertAnalysis)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Lookup(LookupError::Forbidden(_))));
        assert_eq!(harness.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_enum_is_parse_error() {
        let harness = Harness::new(ScriptedProvider::always(
            r#"{"securityEventType": "alien_invasion"}"#,
        ));

        let err = harness
            .pipeline
            .run(&harness.alert_request(), AnalysisKind::Classification)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Parse(ParseError::InvalidEnum { .. })));
        assert_eq!(harness.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_progress_reports_each_stage() {
        let harness = Harness::new(ScriptedProvider::always("no json here"));
        let mut events = harness.pipeline.progress().subscribe();

        let _ = harness
            .pipeline
            .run(&harness.alert_request(), AnalysisKind::Timeline)
            .await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push((event.stage, event.status));
        }

        assert_eq!(seen.first(), Some(&(Stage::Context, StageStatus::Started)));
        assert_eq!(seen.last(), Some(&(Stage::Extraction, StageStatus::Failed)));
        assert!(!seen.iter().any(|(stage, _)| *stage == Stage::Persistence));
    }
}
