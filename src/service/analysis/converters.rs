//! Converters from normalized objects to typed analysis results

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::ParseError;
use crate::model::analysis::{AnalysisKind, AnalysisResult};

fn typed<T: DeserializeOwned>(kind: AnalysisKind, normalized: &Map<String, Value>) -> Result<T, ParseError> {
    serde_json::from_value(Value::Object(normalized.clone())).map_err(|e| ParseError::TypeMismatch {
        field: kind.as_str().to_string(),
        expected: "a result matching the schema",
        found: e.to_string(),
    })
}

/// Convert a normalized object into the typed result for its kind
pub fn convert_result(
    kind: AnalysisKind,
    normalized: &Map<String, Value>,
) -> Result<AnalysisResult, ParseError> {
    Ok(match kind {
        AnalysisKind::AlertAnalysis => AnalysisResult::AlertAnalysis(typed(kind, normalized)?),
        AnalysisKind::Classification => AnalysisResult::Classification(typed(kind, normalized)?),
        AnalysisKind::ImpactAssessment => {
            AnalysisResult::ImpactAssessment(typed(kind, normalized)?)
        }
        AnalysisKind::InvestigationPlan => {
            AnalysisResult::InvestigationPlan(typed(kind, normalized)?)
        }
        AnalysisKind::ContainmentStrategy => {
            AnalysisResult::ContainmentStrategy(typed(kind, normalized)?)
        }
        AnalysisKind::Timeline => AnalysisResult::Timeline(typed(kind, normalized)?),
        AnalysisKind::IncidentForm => AnalysisResult::IncidentForm(typed(kind, normalized)?),
        AnalysisKind::ImmediateActionPlaybook | AnalysisKind::InvestigationPlaybook => {
            AnalysisResult::Playbook(typed(kind, normalized)?)
        }
        AnalysisKind::ThreatHunt => AnalysisResult::ThreatHunt(typed(kind, normalized)?),
        AnalysisKind::LogAnalysis => AnalysisResult::LogAnalysis(typed(kind, normalized)?),
    })
}
