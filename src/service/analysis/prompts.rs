//! Prompts for every analysis kind
//!
//! Rendering is deterministic: the same context and kind always produce the
//! same strings. The output shape is restated on every call because the model
//! keeps no memory between requests.

use std::fmt::Write;

use super::schema::{FieldDefault, FieldSpec, FieldType, schema_for};
use crate::model::analysis::AnalysisKind;
use crate::model::context::PromptContext;

/// System prompt for alert, incident and asset analysis
pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are a Security Operations Center (SOC) analyst.

Your role is to triage security alerts and incidents and to produce structured
findings that other tools store and act on.

You must:
- Base conclusions strictly on the provided context
- Prefer conservative ratings when evidence is weak
- Use only the allowed values listed for enumerated fields
- Leave a list empty rather than inventing entries

Do not:
- Invent hosts, users, indicators or timestamps
- Add commentary before or after the JSON object

Your output must be a single JSON object that conforms to the requested shape."#;

/// System prompt for playbook generation
pub const PLAYBOOK_SYSTEM_PROMPT: &str = r#"You are an incident response engineer who writes SOC playbooks.

Your role is to turn an analyzed alert into an ordered set of response steps
that analysts and automation can execute.

You must:
- Order steps the way they should be executed
- Mark steps "automated" only when a tool can run them without an analyst
- Give every step a realistic duration in seconds
- Keep step names short and descriptions specific to the alert

Your output must be a single JSON object that conforms to the requested shape."#;

/// System prompt for threat hunting reports
pub const THREAT_HUNTER_SYSTEM_PROMPT: &str = r#"You are a threat hunting specialist in a Security Operations Center.

Your role is to correlate indicators of compromise with threat intelligence,
attribute activity to malware families or campaigns where the evidence allows,
and recommend hunts that find related activity elsewhere in the environment.

You must:
- Treat the threat intelligence section as the only source of reputation data
- Mark an indicator "unknown" when no intelligence covers it
- Write hunting queries that an analyst can paste into a SIEM
- Separate immediate actions from long-term hunting strategies

Your output must be a single JSON object that conforms to the requested shape."#;

const EVENT_TYPE_GUIDE: &str = r#"### Event Types
- `malware_infection`: malware is present on a system and needs containment
- `data_exfiltration`: data was accessed or moved outside the organization without authorization
- `unauthorized_access`: attempted or successful access to a system or account without permission
- `network_intrusion`: an external actor is scanning or compromising the network
- `insider_threat`: harmful activity by a user with legitimate access
- `phishing_attack`: social engineering through email, web or messaging
- `vulnerability_exploitation`: active exploitation of a known or unknown vulnerability
- `denial_of_service`: an attempt to degrade availability or performance
- `false_positive`: legitimate activity triggered the alert
- `requires_investigation`: evidence is insufficient or conflicting

### Severity Levels
- `critical`: active breach or immediate threat to operations
- `high`: significant risk, respond within 4 hours
- `medium`: moderate risk, respond within 24 hours
- `low`: minor concern, routine follow-up
- `informational`: no action required"#;

/// Rendered system and user prompts for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: &'static str,
    pub user: String,
}

fn task_statement(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::AlertAnalysis => {
            "Analyze the security alert below. Summarize what happened, rate the risk, decide whether it is likely a false positive, and list the findings, indicators and next actions."
        }
        AnalysisKind::Classification => {
            "Classify the security alert below by event type and severity, estimate how likely it is to correlate with other alerts, and explain your reasoning."
        }
        AnalysisKind::ImpactAssessment => {
            "Assess the business impact of the security event described below, including affected systems, data at risk and the effect on confidentiality, integrity and availability."
        }
        AnalysisKind::InvestigationPlan => {
            "Write an investigation plan for the security event described below as an ordered list of concrete steps, each with its rationale and data sources."
        }
        AnalysisKind::ContainmentStrategy => {
            "Propose a containment strategy for the security event described below: the actions to take in order, what each targets, and how to roll them back."
        }
        AnalysisKind::Timeline => {
            "Reconstruct the timeline of the security event described below in chronological order and identify the furthest attack stage reached."
        }
        AnalysisKind::IncidentForm => {
            "Draft an incident record for the security event described below with a title, description, severity, category, priority, affected assets and recommended actions."
        }
        AnalysisKind::ImmediateActionPlaybook => {
            "Create an immediate action playbook for the alert below. Focus on the first hour: containment, evidence preservation and notification."
        }
        AnalysisKind::InvestigationPlaybook => {
            "Create an investigation playbook for the alert below. Focus on scoping, evidence collection, root cause analysis and recovery."
        }
        AnalysisKind::ThreatHunt => {
            "Write a threat hunting report for the security event below. Correlate its indicators with the threat intelligence provided, attribute the activity where possible and recommend hunting queries."
        }
        AnalysisKind::LogAnalysis => {
            "Analyze the log entries below. Reconstruct the sequence of events, point out suspicious activity and list values worth checking as indicators of compromise."
        }
    }
}

fn example_output(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::AlertAnalysis => {
            r#"{
  "summary": "Repeated failed logins followed by a success from an unfamiliar IP.",
  "riskLevel": "high",
  "isLikelyFalsePositive": false,
  "keyFindings": ["42 failed logins in 5 minutes", "successful login from 203.0.113.7"],
  "indicators": ["203.0.113.7"],
  "recommendedActions": ["Reset the account password", "Review sessions from 203.0.113.7"],
  "confidence": 80
}"#
        }
        AnalysisKind::Classification => {
            r#"{
  "securityEventType": "unauthorized_access",
  "severityLevel": "high",
  "eventTags": ["brute-force", "vpn"],
  "correlationPotential": "medium",
  "overallConfidence": 80,
  "reasoning": "Failed logins followed by a success indicate credential guessing.",
  "mitreTactics": ["TA0006"]
}"#
        }
        AnalysisKind::ImpactAssessment => {
            r#"{
  "businessImpact": "Attacker access to the VPN exposes internal finance systems.",
  "impactLevel": "high",
  "affectedSystems": ["vpn-gw-01"],
  "dataAtRisk": ["payroll records"],
  "confidentialityImpact": "high",
  "integrityImpact": "medium",
  "availabilityImpact": "low",
  "confidence": 70
}"#
        }
        AnalysisKind::InvestigationPlan => {
            r#"{
  "objective": "Determine whether the account was used after the successful login.",
  "investigationSteps": [
    {"order": 1, "action": "Export VPN session logs", "rationale": "Establish session scope", "dataSources": ["VPN logs"]}
  ],
  "evidenceToCollect": ["VPN session logs"],
  "priority": "high",
  "confidence": 75
}"#
        }
        AnalysisKind::ContainmentStrategy => {
            r#"{
  "urgency": "immediate",
  "containmentActions": [
    {"action": "Disable the user account", "target": "jdoe", "priority": "critical", "automated": true}
  ],
  "rollbackPlan": "Re-enable the account after a password reset.",
  "risks": ["User loses access during containment"],
  "confidence": 75
}"#
        }
        AnalysisKind::Timeline => {
            r#"{
  "summary": "Credential guessing led to a successful VPN login.",
  "events": [
    {"timestamp": "2025-01-15T10:02:00Z", "description": "First failed login", "source": "VPN logs", "significance": "medium"}
  ],
  "attackStage": "initial_access",
  "confidence": 70
}"#
        }
        AnalysisKind::IncidentForm => {
            r#"{
  "title": "VPN account compromise via brute force",
  "description": "An external IP guessed the password of a VPN account and logged in.",
  "severity": "high",
  "category": "unauthorized_access",
  "priority": "high",
  "affectedAssets": ["vpn-gw-01"],
  "recommendedActions": ["Reset credentials", "Enforce MFA"],
  "tags": ["vpn", "brute-force"],
  "confidence": 80
}"#
        }
        AnalysisKind::ImmediateActionPlaybook | AnalysisKind::InvestigationPlaybook => {
            r#"{
  "name": "VPN Brute Force Response",
  "description": "Contain and investigate a brute-forced VPN account.",
  "category": "Access Control",
  "triggerType": "manual",
  "steps": [
    {"id": "step-1", "name": "Disable Account", "type": "automated", "description": "Disable the compromised account", "timeout": 300, "isRequired": true, "order": 1},
    {"id": "step-2", "name": "Notify Owner", "type": "manual", "description": "Contact the account owner", "timeout": 600, "isRequired": true, "order": 2}
  ],
  "estimatedTime": 900,
  "complexityLevel": "intermediate",
  "triggerConditions": {"alert_type": "brute_force"},
  "inputParameters": {"username": "Account under attack"},
  "outputFormat": {"execution_log": "Step results"}
}"#
        }
        AnalysisKind::ThreatHunt => {
            r#"{
  "executiveSummary": "Workstation traffic matches Emotet command and control infrastructure.",
  "threatLevel": "high",
  "iocFindings": [
    {"ioc": "203.0.113.7", "status": "malicious", "malwareFamilies": ["Emotet"], "threatTypes": ["botnet_cc"]}
  ],
  "malwareFamilies": ["Emotet"],
  "campaigns": [],
  "huntingQueries": ["dst_ip = 203.0.113.7 | stats count by src_host"],
  "immediateActions": ["Block 203.0.113.7 at the perimeter"],
  "longTermStrategies": ["Alert on new outbound connections to flagged infrastructure"],
  "confidence": 70
}"#
        }
        AnalysisKind::LogAnalysis => {
            r#"{
  "suspiciousActivities": ["42 failed logins for jdoe within 5 minutes"],
  "timelineAnalysis": "Failed logins from 203.0.113.7 start at 10:02 and end with a success at 10:07.",
  "iocCandidates": ["203.0.113.7"],
  "confidenceAssessment": "Logs cover the whole window, so the sequence is reliable.",
  "recommendedFollowup": ["Check other accounts for logins from 203.0.113.7"],
  "confidence": 75
}"#
        }
    }
}

/// Render the prompts for `kind` over `context`
pub fn render(kind: AnalysisKind, context: &PromptContext) -> RenderedPrompt {
    let system = match (kind, kind.playbook_type()) {
        (_, Some(_)) => PLAYBOOK_SYSTEM_PROMPT,
        (AnalysisKind::ThreatHunt, None) => THREAT_HUNTER_SYSTEM_PROMPT,
        _ => ANALYST_SYSTEM_PROMPT,
    };

    RenderedPrompt {
        system,
        user: build_user_prompt(kind, context),
    }
}

fn build_user_prompt(kind: AnalysisKind, context: &PromptContext) -> String {
    let mut prompt = String::new();

    prompt.push_str("# Task\n");
    prompt.push_str(task_statement(kind));
    prompt.push_str("\n\n");

    for section in context.sections() {
        let _ = writeln!(prompt, "## {}", section.title);
        for field in &section.fields {
            if field.value.contains('\n') {
                let _ = writeln!(prompt, "- {}:\n{}", field.label, field.value);
            } else {
                let _ = writeln!(prompt, "- {}: {}", field.label, field.value);
            }
        }
        prompt.push('\n');
    }

    if kind == AnalysisKind::Classification {
        prompt.push_str(EVENT_TYPE_GUIDE);
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Required Output\n");
    prompt.push_str(
        "Respond with one JSON object and nothing else. Use exactly this shape:\n```json\n",
    );
    prompt.push_str(example_output(kind));
    prompt.push_str("\n```\n\n### Field Rules\n");
    write_field_rules(&mut prompt, schema_for(kind).fields, "");

    prompt
}

fn write_field_rules(out: &mut String, fields: &[FieldSpec], prefix: &str) {
    for spec in fields {
        let name = format!("{}{}", prefix, spec.name);
        let presence = match spec.default {
            FieldDefault::Required => "required".to_string(),
            FieldDefault::Text(s) => format!("optional, default \"{}\"", s),
            FieldDefault::Number(n) => format!("optional, default {}", n),
            FieldDefault::Integer(n) => format!("optional, default {}", n),
            FieldDefault::Bool(b) => format!("optional, default {}", b),
            FieldDefault::EmptyList => "optional, default []".to_string(),
            FieldDefault::EmptyObject => "optional, default {}".to_string(),
            FieldDefault::Position => "optional, defaults to the position in the list".to_string(),
            FieldDefault::PositionId(p) => format!("optional, default \"{}<position>\"", p),
            FieldDefault::SumOf { list, field } => {
                format!("optional, default sum of {}[].{}", list, field)
            }
        };

        let _ = write!(
            out,
            "- `{}` ({}, {}): {}",
            name,
            spec.ty.describe(),
            presence,
            spec.description
        );
        if let FieldType::Enum(allowed) = spec.ty {
            let _ = write!(out, ". One of: {}", allowed.join(", "));
        }
        out.push('\n');

        if let FieldType::ObjectList(nested) = spec.ty {
            write_field_rules(out, nested, &format!("{}[].", name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::EntityRef;
    use uuid::Uuid;

    fn context() -> PromptContext {
        let mut builder = PromptContext::builder(EntityRef::alert(Uuid::nil()));
        builder
            .field("Alert", "Title", "Suspicious login")
            .field("Alert", "Severity", "4 (high)")
            .json_field("Alert", "Raw Data", &serde_json::json!({"src_ip": "203.0.113.7"}));
        builder.build()
    }

    #[test]
    fn test_render_is_deterministic() {
        let ctx = context();
        for kind in AnalysisKind::ALL {
            assert_eq!(render(kind, &ctx), render(kind, &ctx));
        }
    }

    #[test]
    fn test_prompt_inlines_context_and_schema() {
        let prompt = render(AnalysisKind::Classification, &context());

        assert_eq!(prompt.system, ANALYST_SYSTEM_PROMPT);
        assert!(prompt.user.contains("- Title: Suspicious login"));
        assert!(prompt.user.contains("- Severity: 4 (high)"));
        assert!(prompt.user.contains("\"src_ip\": \"203.0.113.7\""));
        assert!(prompt.user.contains("`securityEventType` (string, required)"));
        assert!(prompt.user.contains("`correlationPotential` (string, optional, default \"medium\")"));
        assert!(prompt.user.contains("malware_infection, data_exfiltration"));
    }

    #[test]
    fn test_playbook_prompt_lists_nested_rules() {
        let prompt = render(AnalysisKind::InvestigationPlaybook, &context());

        assert_eq!(prompt.system, PLAYBOOK_SYSTEM_PROMPT);
        assert!(prompt.user.contains("`steps[].name` (string, required)"));
        assert!(prompt.user.contains("`estimatedTime` (integer, optional, default sum of steps[].timeout)"));
    }

    #[test]
    fn test_threat_hunt_uses_hunter_prompt() {
        let prompt = render(AnalysisKind::ThreatHunt, &context());

        assert_eq!(prompt.system, THREAT_HUNTER_SYSTEM_PROMPT);
        assert!(prompt.user.contains("`iocFindings[].status` (string, optional, default \"unknown\")"));
        assert_eq!(render(AnalysisKind::LogAnalysis, &context()).system, ANALYST_SYSTEM_PROMPT);
    }

    #[test]
    fn test_examples_are_valid_json_with_marker() {
        for kind in AnalysisKind::ALL {
            let example: serde_json::Value = serde_json::from_str(example_output(kind)).unwrap();
            assert!(example.get(schema_for(kind).marker).is_some(), "{}", kind);
        }
    }
}
