//! Output schemas for every analysis kind
//!
//! One table per kind drives both the field rules rendered into the prompt and
//! the normalizer, so the two cannot drift apart.

use crate::model::analysis::AnalysisKind;

pub const RISK_LEVELS: &[&str] = &["critical", "high", "medium", "low"];
pub const SEVERITY_LEVELS: &[&str] = &["critical", "high", "medium", "low", "informational"];
pub const LEVELS: &[&str] = &["high", "medium", "low"];
pub const CIA_IMPACTS: &[&str] = &["none", "low", "medium", "high"];
pub const URGENCIES: &[&str] = &["immediate", "high", "medium", "low"];
pub const EVENT_TYPES: &[&str] = &[
    "malware_infection",
    "data_exfiltration",
    "unauthorized_access",
    "network_intrusion",
    "insider_threat",
    "phishing_attack",
    "vulnerability_exploitation",
    "denial_of_service",
    "false_positive",
    "requires_investigation",
];
pub const ATTACK_STAGES: &[&str] = &[
    "reconnaissance",
    "initial_access",
    "execution",
    "persistence",
    "privilege_escalation",
    "lateral_movement",
    "exfiltration",
    "impact",
    "unknown",
];
pub const INCIDENT_CATEGORIES: &[&str] = &[
    "malware",
    "phishing",
    "data_breach",
    "unauthorized_access",
    "denial_of_service",
    "insider_threat",
    "network_intrusion",
    "other",
];
pub const TRIGGER_TYPES: &[&str] = &["automatic", "manual"];
pub const STEP_TYPES: &[&str] = &["automated", "manual"];
pub const COMPLEXITY_LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];
pub const IOC_STATUSES: &[&str] = &["malicious", "suspicious", "clean", "unknown"];

pub const DEFAULT_CONFIDENCE: f64 = 75.0;
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_PLAYBOOK_CATEGORY: &str = "General Security Response";

#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Text,
    Number,
    /// Non-negative whole number
    Integer,
    Bool,
    Enum(&'static [&'static str]),
    TextList,
    ObjectList(&'static [FieldSpec]),
    /// Free-form JSON object, passed through untouched
    Object,
}

impl FieldType {
    pub fn describe(&self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Bool => "boolean",
            FieldType::Enum(_) => "string",
            FieldType::TextList => "array of strings",
            FieldType::ObjectList(_) => "array of objects",
            FieldType::Object => "object",
        }
    }
}

/// Value used when an optional field is missing or null
#[derive(Debug, Clone, Copy)]
pub enum FieldDefault {
    Required,
    Text(&'static str),
    Number(f64),
    Integer(u64),
    Bool(bool),
    EmptyList,
    EmptyObject,
    /// 1-based position within the enclosing list
    Position,
    /// Prefix followed by the 1-based position (e.g. `step-3`)
    PositionId(&'static str),
    /// Sum of an integer field across an object list of the same object
    SumOf {
        list: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: FieldDefault,
    pub description: &'static str,
}

const fn field(
    name: &'static str,
    ty: FieldType,
    default: FieldDefault,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        default,
        description,
    }
}

const fn required(name: &'static str, ty: FieldType, description: &'static str) -> FieldSpec {
    field(name, ty, FieldDefault::Required, description)
}

const fn confidence(name: &'static str) -> FieldSpec {
    field(
        name,
        FieldType::Number,
        FieldDefault::Number(DEFAULT_CONFIDENCE),
        "confidence in this result, 0-100",
    )
}

/// Output schema of one analysis kind
#[derive(Debug)]
pub struct Schema {
    /// Key whose presence identifies this schema among several JSON objects
    pub marker: &'static str,
    pub fields: &'static [FieldSpec],
}

const ALERT_ANALYSIS: &[FieldSpec] = &[
    required("summary", FieldType::Text, "two or three sentence summary of what happened"),
    field("riskLevel", FieldType::Enum(RISK_LEVELS), FieldDefault::Text("medium"), "overall risk"),
    field(
        "isLikelyFalsePositive",
        FieldType::Bool,
        FieldDefault::Bool(false),
        "true when the evidence points to benign activity",
    ),
    field("keyFindings", FieldType::TextList, FieldDefault::EmptyList, "facts observed in the alert"),
    field("indicators", FieldType::TextList, FieldDefault::EmptyList, "IOCs present in the alert"),
    field(
        "recommendedActions",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "next actions for the analyst",
    ),
    confidence("confidence"),
];

const CLASSIFICATION: &[FieldSpec] = &[
    required("securityEventType", FieldType::Enum(EVENT_TYPES), "best matching event type"),
    field(
        "severityLevel",
        FieldType::Enum(SEVERITY_LEVELS),
        FieldDefault::Text("medium"),
        "severity of the event",
    ),
    field("eventTags", FieldType::TextList, FieldDefault::EmptyList, "short lowercase tags"),
    field(
        "correlationPotential",
        FieldType::Enum(LEVELS),
        FieldDefault::Text("medium"),
        "likelihood this alert is part of a wider campaign",
    ),
    confidence("overallConfidence"),
    field("reasoning", FieldType::Text, FieldDefault::Text(""), "why this classification was chosen"),
    field(
        "mitreTactics",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "MITRE ATT&CK tactic names or IDs",
    ),
];

const IMPACT_ASSESSMENT: &[FieldSpec] = &[
    required("businessImpact", FieldType::Text, "impact on business operations"),
    field("impactLevel", FieldType::Enum(RISK_LEVELS), FieldDefault::Text("medium"), "overall impact"),
    field("affectedSystems", FieldType::TextList, FieldDefault::EmptyList, "systems affected"),
    field("dataAtRisk", FieldType::TextList, FieldDefault::EmptyList, "data categories at risk"),
    field(
        "confidentialityImpact",
        FieldType::Enum(CIA_IMPACTS),
        FieldDefault::Text("medium"),
        "impact on confidentiality",
    ),
    field(
        "integrityImpact",
        FieldType::Enum(CIA_IMPACTS),
        FieldDefault::Text("medium"),
        "impact on integrity",
    ),
    field(
        "availabilityImpact",
        FieldType::Enum(CIA_IMPACTS),
        FieldDefault::Text("medium"),
        "impact on availability",
    ),
    confidence("confidence"),
];

const INVESTIGATION_STEP: &[FieldSpec] = &[
    field("order", FieldType::Integer, FieldDefault::Position, "1-based step number"),
    required("action", FieldType::Text, "what to do"),
    field("rationale", FieldType::Text, FieldDefault::Text(""), "why this step matters"),
    field("dataSources", FieldType::TextList, FieldDefault::EmptyList, "logs or tools to consult"),
];

const INVESTIGATION_PLAN: &[FieldSpec] = &[
    field("objective", FieldType::Text, FieldDefault::Text(""), "what the investigation must establish"),
    required(
        "investigationSteps",
        FieldType::ObjectList(INVESTIGATION_STEP),
        "ordered investigation steps",
    ),
    field(
        "evidenceToCollect",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "artifacts to preserve",
    ),
    field("priority", FieldType::Enum(RISK_LEVELS), FieldDefault::Text("medium"), "investigation priority"),
    confidence("confidence"),
];

const CONTAINMENT_ACTION: &[FieldSpec] = &[
    required("action", FieldType::Text, "containment action"),
    field("target", FieldType::Text, FieldDefault::Text(""), "host, account or network segment"),
    field("priority", FieldType::Enum(RISK_LEVELS), FieldDefault::Text("medium"), "action priority"),
    field(
        "automated",
        FieldType::Bool,
        FieldDefault::Bool(false),
        "true when the action can run without an analyst",
    ),
];

const CONTAINMENT_STRATEGY: &[FieldSpec] = &[
    field("urgency", FieldType::Enum(URGENCIES), FieldDefault::Text("medium"), "how fast to act"),
    required(
        "containmentActions",
        FieldType::ObjectList(CONTAINMENT_ACTION),
        "containment actions in execution order",
    ),
    field("rollbackPlan", FieldType::Text, FieldDefault::Text(""), "how to undo the containment"),
    field("risks", FieldType::TextList, FieldDefault::EmptyList, "side effects of containment"),
    confidence("confidence"),
];

const TIMELINE_ENTRY: &[FieldSpec] = &[
    field("timestamp", FieldType::Text, FieldDefault::Text(""), "ISO-8601 time, empty when unknown"),
    required("description", FieldType::Text, "what happened"),
    field("source", FieldType::Text, FieldDefault::Text(""), "where the event was observed"),
    field(
        "significance",
        FieldType::Enum(RISK_LEVELS),
        FieldDefault::Text("medium"),
        "importance of the event",
    ),
];

const TIMELINE: &[FieldSpec] = &[
    field("summary", FieldType::Text, FieldDefault::Text(""), "narrative of the sequence of events"),
    required("events", FieldType::ObjectList(TIMELINE_ENTRY), "events in chronological order"),
    field(
        "attackStage",
        FieldType::Enum(ATTACK_STAGES),
        FieldDefault::Text("unknown"),
        "furthest attack stage reached",
    ),
    confidence("confidence"),
];

const INCIDENT_FORM: &[FieldSpec] = &[
    required("title", FieldType::Text, "concise incident title"),
    field("description", FieldType::Text, FieldDefault::Text(""), "incident description for the record"),
    field("severity", FieldType::Enum(RISK_LEVELS), FieldDefault::Text("medium"), "incident severity"),
    field(
        "category",
        FieldType::Enum(INCIDENT_CATEGORIES),
        FieldDefault::Text("other"),
        "incident category",
    ),
    field("priority", FieldType::Enum(RISK_LEVELS), FieldDefault::Text("medium"), "handling priority"),
    field("affectedAssets", FieldType::TextList, FieldDefault::EmptyList, "affected assets"),
    field(
        "recommendedActions",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "response actions",
    ),
    field("tags", FieldType::TextList, FieldDefault::EmptyList, "short lowercase tags"),
    confidence("confidence"),
];

const PLAYBOOK_STEP: &[FieldSpec] = &[
    field("id", FieldType::Text, FieldDefault::PositionId("step-"), "step identifier"),
    required("name", FieldType::Text, "short step name"),
    field("type", FieldType::Enum(STEP_TYPES), FieldDefault::Text("manual"), "who executes the step"),
    field("description", FieldType::Text, FieldDefault::Text(""), "what the step does"),
    field(
        "timeout",
        FieldType::Integer,
        FieldDefault::Integer(DEFAULT_STEP_TIMEOUT_SECS),
        "expected duration in seconds",
    ),
    field("isRequired", FieldType::Bool, FieldDefault::Bool(true), "whether the step may be skipped"),
    field("order", FieldType::Integer, FieldDefault::Position, "1-based step number"),
];

const PLAYBOOK: &[FieldSpec] = &[
    required("name", FieldType::Text, "playbook name"),
    field("description", FieldType::Text, FieldDefault::Text(""), "what the playbook achieves"),
    field(
        "category",
        FieldType::Text,
        FieldDefault::Text(DEFAULT_PLAYBOOK_CATEGORY),
        "response category",
    ),
    field(
        "triggerType",
        FieldType::Enum(TRIGGER_TYPES),
        FieldDefault::Text("manual"),
        "how the playbook starts",
    ),
    required("steps", FieldType::ObjectList(PLAYBOOK_STEP), "ordered response steps"),
    field(
        "estimatedTime",
        FieldType::Integer,
        FieldDefault::SumOf {
            list: "steps",
            field: "timeout",
        },
        "total duration in seconds, defaults to the sum of step timeouts",
    ),
    field(
        "complexityLevel",
        FieldType::Enum(COMPLEXITY_LEVELS),
        FieldDefault::Text("intermediate"),
        "skill level needed",
    ),
    field(
        "triggerConditions",
        FieldType::Object,
        FieldDefault::EmptyObject,
        "conditions that start the playbook",
    ),
    field(
        "inputParameters",
        FieldType::Object,
        FieldDefault::EmptyObject,
        "inputs the playbook expects",
    ),
    field("outputFormat", FieldType::Object, FieldDefault::EmptyObject, "outputs the playbook produces"),
];

const IOC_FINDING: &[FieldSpec] = &[
    required("ioc", FieldType::Text, "indicator value as it appears in the context"),
    field(
        "status",
        FieldType::Enum(IOC_STATUSES),
        FieldDefault::Text("unknown"),
        "verdict backed by the reputation data",
    ),
    field("malwareFamilies", FieldType::TextList, FieldDefault::EmptyList, "associated malware families"),
    field("threatTypes", FieldType::TextList, FieldDefault::EmptyList, "threat types such as botnet_cc"),
];

const THREAT_HUNT: &[FieldSpec] = &[
    required("executiveSummary", FieldType::Text, "two or three sentence summary for leadership"),
    field(
        "threatLevel",
        FieldType::Enum(RISK_LEVELS),
        FieldDefault::Text("medium"),
        "overall threat level",
    ),
    field("iocFindings", FieldType::ObjectList(IOC_FINDING), FieldDefault::EmptyList, "per-indicator findings"),
    field("malwareFamilies", FieldType::TextList, FieldDefault::EmptyList, "malware families observed"),
    field("campaigns", FieldType::TextList, FieldDefault::EmptyList, "campaigns or actors the activity matches"),
    field(
        "huntingQueries",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "queries to run across logs and endpoints",
    ),
    field("immediateActions", FieldType::TextList, FieldDefault::EmptyList, "actions for the next hours"),
    field(
        "longTermStrategies",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "detections and hunts to keep running",
    ),
    confidence("confidence"),
];

const LOG_ANALYSIS: &[FieldSpec] = &[
    required(
        "suspiciousActivities",
        FieldType::TextList,
        "suspicious activities found in the log entries",
    ),
    field("timelineAnalysis", FieldType::Text, FieldDefault::Text(""), "sequence of events in the logs"),
    field("iocCandidates", FieldType::TextList, FieldDefault::EmptyList, "values worth checking as indicators"),
    field(
        "confidenceAssessment",
        FieldType::Text,
        FieldDefault::Text(""),
        "how reliable the findings are and why",
    ),
    field(
        "recommendedFollowup",
        FieldType::TextList,
        FieldDefault::EmptyList,
        "next investigation steps",
    ),
    confidence("confidence"),
];

static ALERT_ANALYSIS_SCHEMA: Schema = Schema {
    marker: "isLikelyFalsePositive",
    fields: ALERT_ANALYSIS,
};
static CLASSIFICATION_SCHEMA: Schema = Schema {
    marker: "securityEventType",
    fields: CLASSIFICATION,
};
static IMPACT_ASSESSMENT_SCHEMA: Schema = Schema {
    marker: "businessImpact",
    fields: IMPACT_ASSESSMENT,
};
static INVESTIGATION_PLAN_SCHEMA: Schema = Schema {
    marker: "investigationSteps",
    fields: INVESTIGATION_PLAN,
};
static CONTAINMENT_STRATEGY_SCHEMA: Schema = Schema {
    marker: "containmentActions",
    fields: CONTAINMENT_STRATEGY,
};
static TIMELINE_SCHEMA: Schema = Schema {
    marker: "events",
    fields: TIMELINE,
};
static INCIDENT_FORM_SCHEMA: Schema = Schema {
    marker: "title",
    fields: INCIDENT_FORM,
};
static PLAYBOOK_SCHEMA: Schema = Schema {
    marker: "steps",
    fields: PLAYBOOK,
};
static THREAT_HUNT_SCHEMA: Schema = Schema {
    marker: "executiveSummary",
    fields: THREAT_HUNT,
};
static LOG_ANALYSIS_SCHEMA: Schema = Schema {
    marker: "suspiciousActivities",
    fields: LOG_ANALYSIS,
};

pub fn schema_for(kind: AnalysisKind) -> &'static Schema {
    match kind {
        AnalysisKind::AlertAnalysis => &ALERT_ANALYSIS_SCHEMA,
        AnalysisKind::Classification => &CLASSIFICATION_SCHEMA,
        AnalysisKind::ImpactAssessment => &IMPACT_ASSESSMENT_SCHEMA,
        AnalysisKind::InvestigationPlan => &INVESTIGATION_PLAN_SCHEMA,
        AnalysisKind::ContainmentStrategy => &CONTAINMENT_STRATEGY_SCHEMA,
        AnalysisKind::Timeline => &TIMELINE_SCHEMA,
        AnalysisKind::IncidentForm => &INCIDENT_FORM_SCHEMA,
        AnalysisKind::ImmediateActionPlaybook | AnalysisKind::InvestigationPlaybook => {
            &PLAYBOOK_SCHEMA
        }
        AnalysisKind::ThreatHunt => &THREAT_HUNT_SCHEMA,
        AnalysisKind::LogAnalysis => &LOG_ANALYSIS_SCHEMA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_a_top_level_field() {
        for kind in AnalysisKind::ALL {
            let schema = schema_for(kind);
            assert!(
                schema.fields.iter().any(|f| f.name == schema.marker),
                "marker {} missing from {} schema",
                schema.marker,
                kind
            );
        }
    }

    #[test]
    fn test_every_schema_has_a_required_field() {
        for kind in AnalysisKind::ALL {
            let fields = schema_for(kind).fields;
            assert!(fields.iter().any(|f| matches!(f.default, FieldDefault::Required)));
        }
    }

    #[test]
    fn test_enum_defaults_are_allowed_values() {
        fn check(fields: &[FieldSpec]) {
            for f in fields {
                match (f.ty, f.default) {
                    (FieldType::Enum(allowed), FieldDefault::Text(d)) => {
                        assert!(allowed.contains(&d), "{} default {} not allowed", f.name, d)
                    }
                    (FieldType::ObjectList(nested), _) => check(nested),
                    _ => {}
                }
            }
        }
        for kind in AnalysisKind::ALL {
            check(schema_for(kind).fields);
        }
    }
}
