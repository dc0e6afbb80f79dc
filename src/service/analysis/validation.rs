//! Quality checks on typed analysis results
//!
//! Errors reject the result; warnings are logged and the result is kept.

use std::collections::HashSet;

use crate::model::analysis::{
    AnalysisResult, PlaybookResult, SecurityEventType, SeverityLevel,
};

/// Result of analysis validation
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the result passed validation
    pub is_valid: bool,
    /// Violations that make the result unusable
    pub errors: Vec<String>,
    /// Potential quality issues
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Validate a typed result
///
/// Checks:
/// 1. Confidence lies within 0-100
/// 2. Lists that carry the whole answer are not empty
/// 3. Required text is not blank
/// 4. Playbook step ordering and estimated time are consistent
pub fn validate_result(result: &AnalysisResult) -> ValidationResult {
    let mut validation = ValidationResult::valid();

    if let Some(confidence) = result.confidence()
        && !(0.0..=100.0).contains(&confidence)
    {
        validation.add_error(format!("confidence {} is outside 0-100", confidence));
    }

    match result {
        AnalysisResult::AlertAnalysis(r) => {
            if r.summary.trim().is_empty() {
                validation.add_error("summary is empty".to_string());
            }
            if r.key_findings.is_empty() {
                validation.add_warning("no key findings reported".to_string());
            }
        }
        AnalysisResult::Classification(r) => {
            if r.security_event_type == SecurityEventType::FalsePositive
                && matches!(r.severity_level, SeverityLevel::Critical | SeverityLevel::High)
            {
                validation.add_warning(format!(
                    "classified as false positive with {:?} severity",
                    r.severity_level
                ));
            }
            if r.reasoning.trim().is_empty() {
                validation.add_warning("classification has no reasoning".to_string());
            }
        }
        AnalysisResult::ImpactAssessment(r) => {
            if r.business_impact.trim().is_empty() {
                validation.add_error("businessImpact is empty".to_string());
            }
        }
        AnalysisResult::InvestigationPlan(r) => {
            if r.investigation_steps.is_empty() {
                validation.add_error("investigation plan has no steps".to_string());
            }
        }
        AnalysisResult::ContainmentStrategy(r) => {
            if r.containment_actions.is_empty() {
                validation.add_error("containment strategy has no actions".to_string());
            }
        }
        AnalysisResult::Timeline(r) => {
            if r.events.is_empty() {
                validation.add_warning("timeline has no events".to_string());
            }
        }
        AnalysisResult::IncidentForm(r) => {
            if r.title.trim().is_empty() {
                validation.add_error("incident title is empty".to_string());
            }
        }
        AnalysisResult::ThreatHunt(r) => {
            if r.executive_summary.trim().is_empty() {
                validation.add_error("executiveSummary is empty".to_string());
            }
            if r.hunting_queries.is_empty() {
                validation.add_warning("threat hunt has no hunting queries".to_string());
            }
        }
        AnalysisResult::LogAnalysis(r) => {
            if r.suspicious_activities.is_empty() && !r.ioc_candidates.is_empty() {
                validation.add_warning(
                    "IOC candidates reported without suspicious activity".to_string(),
                );
            }
        }
        AnalysisResult::Playbook(p) => validate_playbook(p, &mut validation),
    }

    validation
}

fn validate_playbook(playbook: &PlaybookResult, validation: &mut ValidationResult) {
    if playbook.steps.is_empty() {
        validation.add_error("playbook has no steps".to_string());
        return;
    }

    let mut orders = HashSet::new();
    let mut ids = HashSet::new();
    for step in &playbook.steps {
        if !orders.insert(step.order) {
            validation.add_warning(format!("duplicate step order {}", step.order));
        }
        if !ids.insert(step.id.as_str()) {
            validation.add_warning(format!("duplicate step id '{}'", step.id));
        }
        if step.timeout == 0 {
            validation.add_warning(format!("step '{}' has zero timeout", step.name));
        }
    }

    let total: u64 = playbook.steps.iter().map(|s| s.timeout).sum();
    if playbook.estimated_time != total {
        validation.add_warning(format!(
            "estimatedTime {} differs from step total {}",
            playbook.estimated_time, total
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::analysis::AnalysisKind;
    use crate::service::analysis::converters::convert_result;
    use crate::service::analysis::normalize::normalize;
    use serde_json::json;

    fn result(kind: AnalysisKind, value: serde_json::Value) -> AnalysisResult {
        let normalized = normalize(kind, value.as_object().unwrap()).unwrap();
        convert_result(kind, &normalized).unwrap()
    }

    #[test]
    fn test_confidence_out_of_range_is_error() {
        let r = result(
            AnalysisKind::Classification,
            json!({"securityEventType": "phishing_attack", "overallConfidence": 140}),
        );
        let validation = validate_result(&r);
        assert!(!validation.is_valid);
        assert!(validation.errors[0].contains("140"));
    }

    #[test]
    fn test_false_positive_with_high_severity_warns() {
        let r = result(
            AnalysisKind::Classification,
            json!({"securityEventType": "false_positive", "severityLevel": "critical", "reasoning": "scanner"}),
        );
        let validation = validate_result(&r);
        assert!(validation.is_valid);
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn test_blank_hunt_summary_is_error() {
        let r = result(
            AnalysisKind::ThreatHunt,
            json!({"executiveSummary": "  ", "huntingQueries": ["dns.query == \"evil.example\""]}),
        );
        let validation = validate_result(&r);
        assert!(!validation.is_valid);
        assert!(validation.errors[0].contains("executiveSummary"));
    }

    #[test]
    fn test_empty_playbook_is_error() {
        let r = result(AnalysisKind::ImmediateActionPlaybook, json!({"name": "Empty", "steps": []}));
        assert!(!validate_result(&r).is_valid);
    }

    #[test]
    fn test_playbook_estimate_mismatch_warns() {
        let r = result(
            AnalysisKind::InvestigationPlaybook,
            json!({"name": "Investigate", "estimatedTime": 10, "steps": [{"name": "Triage", "timeout": 60}]}),
        );
        let validation = validate_result(&r);
        assert!(validation.is_valid);
        assert!(validation.warnings.iter().any(|w| w.contains("estimatedTime")));
    }
}
