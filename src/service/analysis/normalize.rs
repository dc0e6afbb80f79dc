//! Schema-driven normalization of extracted objects
//!
//! Pure and idempotent: the output map serializes with sorted keys, and
//! normalizing an already normalized object returns it unchanged.

use serde_json::{Map, Number, Value};

use super::error::ParseError;
use super::extraction::json_type_name;
use super::schema::{FieldDefault, FieldSpec, FieldType, schema_for};
use crate::model::analysis::AnalysisKind;

/// Normalize an extracted object against the schema of `kind`
pub fn normalize(
    kind: AnalysisKind,
    object: &Map<String, Value>,
) -> Result<Map<String, Value>, ParseError> {
    normalize_object(schema_for(kind).fields, object, "", 0)
}

/// `position` is the 1-based index within an enclosing list, 0 at top level
fn normalize_object(
    fields: &[FieldSpec],
    object: &Map<String, Value>,
    prefix: &str,
    position: usize,
) -> Result<Map<String, Value>, ParseError> {
    // unknown keys are carried over untouched
    let mut out = object.clone();

    for spec in fields {
        if matches!(spec.default, FieldDefault::SumOf { .. }) {
            continue;
        }
        let path = format!("{}{}", prefix, spec.name);
        let value = match object.get(spec.name) {
            Some(v) if !v.is_null() => coerce(spec.ty, v, &path)?,
            _ => default_value(spec, &path, position)?,
        };
        out.insert(spec.name.to_string(), value);
    }

    // derived defaults read the already normalized fields
    for spec in fields {
        if let FieldDefault::SumOf { list, field } = spec.default {
            let path = format!("{}{}", prefix, spec.name);
            let value = match object.get(spec.name) {
                Some(v) if !v.is_null() => coerce(spec.ty, v, &path)?,
                _ => Value::from(sum_field(&out, list, field, &path)?),
            };
            out.insert(spec.name.to_string(), value);
        }
    }

    Ok(out)
}

fn default_value(spec: &FieldSpec, path: &str, position: usize) -> Result<Value, ParseError> {
    Ok(match spec.default {
        FieldDefault::Required => return Err(ParseError::MissingField(path.to_string())),
        FieldDefault::Text(s) => Value::from(s),
        FieldDefault::Number(n) => number(n),
        FieldDefault::Integer(n) => Value::from(n),
        FieldDefault::Bool(b) => Value::Bool(b),
        FieldDefault::EmptyList => Value::Array(Vec::new()),
        FieldDefault::EmptyObject => Value::Object(Map::new()),
        FieldDefault::Position => Value::from(position as u64),
        FieldDefault::PositionId(prefix) => Value::from(format!("{}{}", prefix, position)),
        // resolved after the other fields
        FieldDefault::SumOf { .. } => Value::from(0u64),
    })
}

fn sum_field(
    object: &Map<String, Value>,
    list: &str,
    field: &str,
    path: &str,
) -> Result<u64, ParseError> {
    let Some(items) = object.get(list).and_then(Value::as_array) else {
        return Ok(0);
    };

    items
        .iter()
        .filter_map(|item| item.get(field).and_then(Value::as_u64))
        .try_fold(0u64, |total, n| total.checked_add(n))
        .ok_or_else(|| {
            ParseError::Constraint(vec![format!(
                "{} overflows: {}[].{} values are too large to add up",
                path, list, field
            )])
        })
}

fn number(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> ParseError {
    ParseError::TypeMismatch {
        field: path.to_string(),
        expected,
        found: json_type_name(found).to_string(),
    }
}

fn coerce(ty: FieldType, value: &Value, path: &str) -> Result<Value, ParseError> {
    match ty {
        FieldType::Text => coerce_text(value, path).map(Value::String),
        FieldType::Number => coerce_number(value, path),
        FieldType::Integer => coerce_integer(value, path),
        FieldType::Bool => coerce_bool(value, path),
        FieldType::Enum(allowed) => coerce_enum(allowed, value, path),
        FieldType::TextList => coerce_text_list(value, path),
        FieldType::ObjectList(fields) => coerce_object_list(fields, value, path),
        FieldType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            other => Err(mismatch(path, "object", other)),
        },
    }
}

fn coerce_text(value: &Value, path: &str) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(mismatch(path, "string", other)),
    }
}

fn coerce_number(value: &Value, path: &str) -> Result<Value, ParseError> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            // "85%" is a common way for models to write a confidence
            let trimmed = s.trim().trim_end_matches('%').trim();
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(number)
                .ok_or_else(|| mismatch(path, "number", value))
        }
        other => Err(mismatch(path, "number", other)),
    }
}

fn coerce_integer(value: &Value, path: &str) -> Result<Value, ParseError> {
    let as_float = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(Value::from(u));
            }
            n.as_f64()
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match as_float {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(Value::from(f as u64)),
        _ => Err(mismatch(path, "non-negative integer", value)),
    }
}

fn coerce_bool(value: &Value, path: &str) -> Result<Value, ParseError> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Ok(Value::Bool(true)),
            "false" | "no" => Ok(Value::Bool(false)),
            _ => Err(mismatch(path, "boolean", value)),
        },
        other => Err(mismatch(path, "boolean", other)),
    }
}

/// Case, space and hyphen insensitive match against the allowed set
fn coerce_enum(
    allowed: &'static [&'static str],
    value: &Value,
    path: &str,
) -> Result<Value, ParseError> {
    let raw = match value {
        Value::String(s) => s,
        other => return Err(mismatch(path, "string", other)),
    };

    let canonical = raw
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_");

    match allowed.iter().find(|a| **a == canonical) {
        Some(a) => Ok(Value::from(*a)),
        None => Err(ParseError::InvalidEnum {
            field: path.to_string(),
            value: raw.clone(),
            allowed: allowed.to_vec(),
        }),
    }
}

fn coerce_text_list(value: &Value, path: &str) -> Result<Value, ParseError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(Value::Array(Vec::new())),
        Value::String(s) => Ok(Value::Array(vec![Value::from(s.clone())])),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                out.push(Value::String(coerce_text(item, &format!("{}[{}]", path, i))?));
            }
            Ok(Value::Array(out))
        }
        other => Err(mismatch(path, "array of strings", other)),
    }
}

fn coerce_object_list(
    fields: &[FieldSpec],
    value: &Value,
    path: &str,
) -> Result<Value, ParseError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        other => return Err(mismatch(path, "array of objects", other)),
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let item_path = format!("{}[{}]", path, i);
        let object = item
            .as_object()
            .ok_or_else(|| mismatch(&item_path, "object", item))?;
        let normalized = normalize_object(fields, object, &format!("{}.", item_path), i + 1)?;
        out.push(Value::Object(normalized));
    }
    Ok(Value::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_classification_defaults() {
        let input = object(json!({"securityEventType": "unauthorized_access", "eventTags": []}));
        let out = normalize(AnalysisKind::Classification, &input).unwrap();

        assert_eq!(out["correlationPotential"], "medium");
        assert_eq!(out["overallConfidence"], 75.0);
        assert_eq!(out["severityLevel"], "medium");
        assert_eq!(out["reasoning"], "");
        assert_eq!(out["mitreTactics"], json!([]));
        assert!(out.values().all(|v| !v.is_null()));
    }

    #[test]
    fn test_missing_required_field() {
        let input = object(json!({"severityLevel": "high"}));
        assert_eq!(
            normalize(AnalysisKind::Classification, &input),
            Err(ParseError::MissingField("securityEventType".to_string()))
        );
    }

    #[test]
    fn test_null_required_field_is_missing() {
        let input = object(json!({"securityEventType": null}));
        assert!(matches!(
            normalize(AnalysisKind::Classification, &input),
            Err(ParseError::MissingField(_))
        ));
    }

    #[test]
    fn test_enum_normalization() {
        let input = object(json!({
            "securityEventType": "Unauthorized Access",
            "severityLevel": "HIGH",
            "correlationPotential": "low"
        }));
        let out = normalize(AnalysisKind::Classification, &input).unwrap();
        assert_eq!(out["securityEventType"], "unauthorized_access");
        assert_eq!(out["severityLevel"], "high");
    }

    #[test]
    fn test_invalid_enum() {
        let input = object(json!({"securityEventType": "ransomware"}));
        match normalize(AnalysisKind::Classification, &input).unwrap_err() {
            ParseError::InvalidEnum { field, value, allowed } => {
                assert_eq!(field, "securityEventType");
                assert_eq!(value, "ransomware");
                assert!(allowed.contains(&"malware_infection"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_coercions() {
        let input = object(json!({
            "securityEventType": "malware_infection",
            "overallConfidence": "85%",
            "eventTags": "malware",
            "mitreTactics": ["TA0002", null, 3]
        }));
        let out = normalize(AnalysisKind::Classification, &input).unwrap();
        assert_eq!(out["overallConfidence"], 85.0);
        assert_eq!(out["eventTags"], json!(["malware"]));
        assert_eq!(out["mitreTactics"], json!(["TA0002", "3"]));
    }

    #[test]
    fn test_extra_keys_preserved() {
        let input = object(json!({"securityEventType": "false_positive", "analystNote": "benign scanner"}));
        let out = normalize(AnalysisKind::Classification, &input).unwrap();
        assert_eq!(out["analystNote"], "benign scanner");
    }

    #[test]
    fn test_playbook_step_defaults_and_estimated_time() {
        let input = object(json!({
            "name": "Contain compromised host",
            "steps": [
                {"name": "Isolate host", "type": "Automated", "timeout": "120"},
                {"name": "Reset credentials", "timeout": 600},
                {"name": "Notify owner"}
            ]
        }));
        let out = normalize(AnalysisKind::ImmediateActionPlaybook, &input).unwrap();

        let steps = out["steps"].as_array().unwrap();
        assert_eq!(steps[0]["id"], "step-1");
        assert_eq!(steps[0]["type"], "automated");
        assert_eq!(steps[0]["timeout"], 120);
        assert_eq!(steps[1]["order"], 2);
        assert_eq!(steps[2]["type"], "manual");
        assert_eq!(steps[2]["isRequired"], true);
        assert_eq!(out["estimatedTime"], 120 + 600 + 300);
        assert_eq!(out["category"], "General Security Response");
        assert_eq!(out["triggerType"], "manual");
        assert_eq!(out["complexityLevel"], "intermediate");
        assert_eq!(out["triggerConditions"], json!({}));
    }

    #[test]
    fn test_estimated_time_overflow_is_rejected() {
        let input = object(json!({
            "name": "Runaway timeouts",
            "steps": [
                {"name": "Wait", "timeout": u64::MAX},
                {"name": "Wait again", "timeout": u64::MAX}
            ]
        }));

        let err = normalize(AnalysisKind::ImmediateActionPlaybook, &input).unwrap_err();
        match err {
            ParseError::Constraint(messages) => assert!(messages[0].contains("estimatedTime")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nested_error_path() {
        let input = object(json!({"name": "x", "steps": [{"name": "a"}, {"type": "manual"}]}));
        assert_eq!(
            normalize(AnalysisKind::InvestigationPlaybook, &input),
            Err(ParseError::MissingField("steps[1].name".to_string()))
        );
    }

    #[test]
    fn test_single_object_wrapped_into_list() {
        let input = object(json!({"containmentActions": {"action": "Block IP 203.0.113.7"}}));
        let out = normalize(AnalysisKind::ContainmentStrategy, &input).unwrap();
        let actions = out["containmentActions"].as_array().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["priority"], "medium");
        assert_eq!(actions[0]["automated"], false);
    }

    #[test]
    fn test_type_mismatch() {
        let input = object(json!({"summary": {"text": "nested"}}));
        assert!(matches!(
            normalize(AnalysisKind::AlertAnalysis, &input),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            (
                AnalysisKind::Classification,
                json!({"securityEventType": "Phishing Attack", "overallConfidence": "60", "eventTags": "email"}),
            ),
            (
                AnalysisKind::InvestigationPlaybook,
                json!({"name": "Investigate", "steps": [{"name": "Collect logs", "timeout": 900.0}]}),
            ),
            (
                AnalysisKind::Timeline,
                json!({"events": [{"description": "First login", "significance": "High"}]}),
            ),
        ];

        for (kind, input) in inputs {
            let once = normalize(kind, &object(input)).unwrap();
            let twice = normalize(kind, &once).unwrap();
            assert_eq!(
                serde_json::to_string(&once).unwrap(),
                serde_json::to_string(&twice).unwrap(),
                "{} not idempotent",
                kind
            );
        }
    }
}
