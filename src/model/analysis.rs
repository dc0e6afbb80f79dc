//! Analysis kinds and their typed results
//!
//! Every kind shares the same extraction and normalization path; the typed
//! structs here are what a normalized object deserializes into.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::EntityKind;

/// The structured outputs the pipeline can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    AlertAnalysis,
    Classification,
    ImpactAssessment,
    InvestigationPlan,
    ContainmentStrategy,
    Timeline,
    IncidentForm,
    ImmediateActionPlaybook,
    InvestigationPlaybook,
    ThreatHunt,
    LogAnalysis,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 11] = [
        AnalysisKind::AlertAnalysis,
        AnalysisKind::Classification,
        AnalysisKind::ImpactAssessment,
        AnalysisKind::InvestigationPlan,
        AnalysisKind::ContainmentStrategy,
        AnalysisKind::Timeline,
        AnalysisKind::IncidentForm,
        AnalysisKind::ImmediateActionPlaybook,
        AnalysisKind::InvestigationPlaybook,
        AnalysisKind::ThreatHunt,
        AnalysisKind::LogAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::AlertAnalysis => "alert_analysis",
            AnalysisKind::Classification => "classification",
            AnalysisKind::ImpactAssessment => "impact_assessment",
            AnalysisKind::InvestigationPlan => "investigation_plan",
            AnalysisKind::ContainmentStrategy => "containment_strategy",
            AnalysisKind::Timeline => "timeline",
            AnalysisKind::IncidentForm => "incident_form",
            AnalysisKind::ImmediateActionPlaybook => "immediate_action_playbook",
            AnalysisKind::InvestigationPlaybook => "investigation_playbook",
            AnalysisKind::ThreatHunt => "threat_hunt",
            AnalysisKind::LogAnalysis => "log_analysis",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Human-readable name used in prompts and timeline events
    pub fn display_name(&self) -> &'static str {
        match self {
            AnalysisKind::AlertAnalysis => "AI alert analysis",
            AnalysisKind::Classification => "security event classification",
            AnalysisKind::ImpactAssessment => "impact assessment",
            AnalysisKind::InvestigationPlan => "investigation plan",
            AnalysisKind::ContainmentStrategy => "containment strategy",
            AnalysisKind::Timeline => "incident timeline",
            AnalysisKind::IncidentForm => "incident draft",
            AnalysisKind::ImmediateActionPlaybook => "immediate action playbook",
            AnalysisKind::InvestigationPlaybook => "investigation playbook",
            AnalysisKind::ThreatHunt => "threat hunting report",
            AnalysisKind::LogAnalysis => "security log analysis",
        }
    }

    /// Whether this kind can be generated for the given source entity kind
    pub fn accepts(&self, entity: EntityKind) -> bool {
        match self {
            AnalysisKind::AlertAnalysis
            | AnalysisKind::Classification
            | AnalysisKind::ImmediateActionPlaybook
            | AnalysisKind::InvestigationPlaybook => entity == EntityKind::Alert,
            AnalysisKind::ImpactAssessment => true,
            AnalysisKind::InvestigationPlan
            | AnalysisKind::ContainmentStrategy
            | AnalysisKind::Timeline
            | AnalysisKind::IncidentForm
            | AnalysisKind::ThreatHunt => {
                matches!(entity, EntityKind::Alert | EntityKind::Incident)
            }
            AnalysisKind::LogAnalysis => matches!(entity, EntityKind::Alert | EntityKind::Asset),
        }
    }

    pub fn playbook_type(&self) -> Option<PlaybookType> {
        match self {
            AnalysisKind::ImmediateActionPlaybook => Some(PlaybookType::ImmediateAction),
            AnalysisKind::InvestigationPlaybook => Some(PlaybookType::Investigation),
            _ => None,
        }
    }

    /// Whether the context must carry indicator reputation verdicts
    pub fn requires_threat_intel(&self) -> bool {
        *self == AnalysisKind::ThreatHunt
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two playbooks generated for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookType {
    ImmediateAction,
    Investigation,
}

impl PlaybookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybookType::ImmediateAction => "immediate_action",
            PlaybookType::Investigation => "investigation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "immediate_action" => Some(PlaybookType::ImmediateAction),
            "investigation" => Some(PlaybookType::Investigation),
            _ => None,
        }
    }

    pub fn analysis_kind(&self) -> AnalysisKind {
        match self {
            PlaybookType::ImmediateAction => AnalysisKind::ImmediateActionPlaybook,
            PlaybookType::Investigation => AnalysisKind::InvestigationPlaybook,
        }
    }
}

// ============================================================================
// Enumerated values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    MalwareInfection,
    DataExfiltration,
    UnauthorizedAccess,
    NetworkIntrusion,
    InsiderThreat,
    PhishingAttack,
    VulnerabilityExploitation,
    DenialOfService,
    FalsePositive,
    RequiresInvestigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiaImpact {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackStage {
    Reconnaissance,
    InitialAccess,
    Execution,
    Persistence,
    PrivilegeEscalation,
    LateralMovement,
    Exfiltration,
    Impact,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Malware,
    Phishing,
    DataBreach,
    UnauthorizedAccess,
    DenialOfService,
    InsiderThreat,
    NetworkIntrusion,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Automated,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Beginner,
    Intermediate,
    Advanced,
}

// ============================================================================
// Typed results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertAnalysisResult {
    pub summary: String,
    pub risk_level: RiskLevel,
    pub is_likely_false_positive: bool,
    pub key_findings: Vec<String>,
    pub indicators: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub security_event_type: SecurityEventType,
    pub severity_level: SeverityLevel,
    pub event_tags: Vec<String>,
    pub correlation_potential: Level,
    pub overall_confidence: f64,
    pub reasoning: String,
    pub mitre_tactics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessmentResult {
    pub business_impact: String,
    pub impact_level: RiskLevel,
    pub affected_systems: Vec<String>,
    pub data_at_risk: Vec<String>,
    pub confidentiality_impact: CiaImpact,
    pub integrity_impact: CiaImpact,
    pub availability_impact: CiaImpact,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationStep {
    pub order: u32,
    pub action: String,
    pub rationale: String,
    pub data_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationPlanResult {
    pub objective: String,
    pub investigation_steps: Vec<InvestigationStep>,
    pub evidence_to_collect: Vec<String>,
    pub priority: RiskLevel,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainmentAction {
    pub action: String,
    pub target: String,
    pub priority: RiskLevel,
    pub automated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainmentStrategyResult {
    pub urgency: Urgency,
    pub containment_actions: Vec<ContainmentAction>,
    pub rollback_plan: String,
    pub risks: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub timestamp: String,
    pub description: String,
    pub source: String,
    pub significance: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResult {
    pub summary: String,
    pub events: Vec<TimelineEntry>,
    pub attack_stage: AttackStage,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentFormResult {
    pub title: String,
    pub description: String,
    pub severity: RiskLevel,
    pub category: IncidentCategory,
    pub priority: RiskLevel,
    pub affected_assets: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub tags: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookStep {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub description: String,
    /// Estimated duration in seconds
    pub timeout: u64,
    pub is_required: bool,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookResult {
    pub name: String,
    pub description: String,
    pub category: String,
    pub trigger_type: TriggerType,
    pub steps: Vec<PlaybookStep>,
    /// Total execution time in seconds
    pub estimated_time: u64,
    pub complexity_level: ComplexityLevel,
    pub trigger_conditions: serde_json::Value,
    pub input_parameters: serde_json::Value,
    pub output_format: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IocStatus {
    Malicious,
    Suspicious,
    Clean,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IocFinding {
    pub ioc: String,
    pub status: IocStatus,
    pub malware_families: Vec<String>,
    pub threat_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatHuntResult {
    pub executive_summary: String,
    pub threat_level: RiskLevel,
    pub ioc_findings: Vec<IocFinding>,
    pub malware_families: Vec<String>,
    pub campaigns: Vec<String>,
    pub hunting_queries: Vec<String>,
    pub immediate_actions: Vec<String>,
    pub long_term_strategies: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAnalysisResult {
    pub suspicious_activities: Vec<String>,
    pub timeline_analysis: String,
    pub ioc_candidates: Vec<String>,
    pub confidence_assessment: String,
    pub recommended_followup: Vec<String>,
    pub confidence: f64,
}

/// Typed result of one pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum AnalysisResult {
    AlertAnalysis(AlertAnalysisResult),
    Classification(ClassificationResult),
    ImpactAssessment(ImpactAssessmentResult),
    InvestigationPlan(InvestigationPlanResult),
    ContainmentStrategy(ContainmentStrategyResult),
    Timeline(TimelineResult),
    IncidentForm(IncidentFormResult),
    Playbook(PlaybookResult),
    ThreatHunt(ThreatHuntResult),
    LogAnalysis(LogAnalysisResult),
}

impl AnalysisResult {
    /// Confidence reported by the model, when the schema carries one
    pub fn confidence(&self) -> Option<f64> {
        match self {
            AnalysisResult::AlertAnalysis(r) => Some(r.confidence),
            AnalysisResult::Classification(r) => Some(r.overall_confidence),
            AnalysisResult::ImpactAssessment(r) => Some(r.confidence),
            AnalysisResult::InvestigationPlan(r) => Some(r.confidence),
            AnalysisResult::ContainmentStrategy(r) => Some(r.confidence),
            AnalysisResult::Timeline(r) => Some(r.confidence),
            AnalysisResult::IncidentForm(r) => Some(r.confidence),
            AnalysisResult::ThreatHunt(r) => Some(r.confidence),
            AnalysisResult::LogAnalysis(r) => Some(r.confidence),
            AnalysisResult::Playbook(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in AnalysisKind::ALL {
            assert_eq!(AnalysisKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AnalysisKind::parse("summary"), None);
    }

    #[test]
    fn test_kind_entity_applicability() {
        assert!(AnalysisKind::Classification.accepts(EntityKind::Alert));
        assert!(!AnalysisKind::Classification.accepts(EntityKind::Incident));
        assert!(AnalysisKind::IncidentForm.accepts(EntityKind::Incident));
        assert!(!AnalysisKind::Timeline.accepts(EntityKind::Asset));
        assert!(AnalysisKind::ImpactAssessment.accepts(EntityKind::Asset));
        assert!(AnalysisKind::ThreatHunt.accepts(EntityKind::Incident));
        assert!(!AnalysisKind::ThreatHunt.accepts(EntityKind::Asset));
        assert!(AnalysisKind::LogAnalysis.accepts(EntityKind::Asset));
        assert!(!AnalysisKind::LogAnalysis.accepts(EntityKind::Incident));
    }

    #[test]
    fn test_playbook_type_mapping() {
        assert_eq!(
            PlaybookType::Investigation.analysis_kind().playbook_type(),
            Some(PlaybookType::Investigation)
        );
        assert_eq!(AnalysisKind::Timeline.playbook_type(), None);
    }
}
