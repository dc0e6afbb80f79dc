//! Prompt context assembled from a source entity and its related rows

use serde::Serialize;

use super::entity::EntityRef;

/// A labeled value rendered into the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextField {
    pub label: String,
    pub value: String,
}

/// A titled group of fields (e.g. "Alert", "Affected Asset")
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSection {
    pub title: String,
    pub fields: Vec<ContextField>,
}

/// Immutable context for one analysis request
///
/// Sections and fields keep insertion order so rendering is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    subject: EntityRef,
    sections: Vec<ContextSection>,
}

impl PromptContext {
    pub fn builder(subject: EntityRef) -> PromptContextBuilder {
        PromptContextBuilder {
            subject,
            sections: Vec::new(),
        }
    }

    pub fn subject(&self) -> EntityRef {
        self.subject
    }

    pub fn sections(&self) -> &[ContextSection] {
        &self.sections
    }

    /// Look up a field value by section title and label
    pub fn field(&self, section: &str, label: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title == section)?
            .fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }

    /// All field values concatenated, used for IOC scanning
    pub fn text(&self) -> String {
        joined_values(&self.sections)
    }
}

fn joined_values(sections: &[ContextSection]) -> String {
    sections
        .iter()
        .flat_map(|s| s.fields.iter().map(|f| f.value.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builder for [`PromptContext`]; empty values are skipped rather than rendered as placeholders
#[derive(Debug, Clone)]
pub struct PromptContextBuilder {
    subject: EntityRef,
    sections: Vec<ContextSection>,
}

impl PromptContextBuilder {
    pub fn field(&mut self, section: &str, label: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if value.trim().is_empty() {
            return self;
        }

        let field = ContextField {
            label: label.to_string(),
            value,
        };

        match self.sections.iter_mut().find(|s| s.title == section) {
            Some(existing) => existing.fields.push(field),
            None => self.sections.push(ContextSection {
                title: section.to_string(),
                fields: vec![field],
            }),
        }
        self
    }

    pub fn optional_field<T: ToString>(
        &mut self,
        section: &str,
        label: &str,
        value: Option<T>,
    ) -> &mut Self {
        match value {
            Some(v) => self.field(section, label, v.to_string()),
            None => self,
        }
    }

    /// Add a JSON value as pretty-printed text, skipping null and empty containers
    pub fn json_field(&mut self, section: &str, label: &str, value: &serde_json::Value) -> &mut Self {
        let is_empty = match value {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if is_empty {
            return self;
        }

        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        self.field(section, label, rendered)
    }

    /// Field values gathered so far
    pub fn text(&self) -> String {
        joined_values(&self.sections)
    }

    pub fn build(self) -> PromptContext {
        PromptContext {
            subject: self.subject,
            sections: self.sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_builder_groups_fields_by_section() {
        let mut builder = PromptContext::builder(EntityRef::alert(Uuid::nil()));
        builder
            .field("Alert", "Title", "Suspicious login")
            .field("Asset", "Name", "web-01")
            .field("Alert", "Severity", "4 (high)");
        let context = builder.build();

        assert_eq!(context.sections().len(), 2);
        assert_eq!(context.field("Alert", "Severity"), Some("4 (high)"));
        assert_eq!(context.field("Asset", "Name"), Some("web-01"));
    }

    #[test]
    fn test_builder_skips_empty_values() {
        let mut builder = PromptContext::builder(EntityRef::alert(Uuid::nil()));
        builder
            .field("Alert", "Description", "   ")
            .optional_field::<String>("Alert", "Source", None)
            .json_field("Alert", "Raw Data", &serde_json::json!({}));
        let context = builder.build();

        assert!(context.sections().is_empty());
    }
}
