//! Domain attribute resolution.
//!
//! Generic node attributes (anything that is not a name or a time value) are
//! only reported when the surrounding system knows how to display them. A
//! [`ColumnResolver`] maps an attribute name to a [`ColumnDef`] describing the
//! display column and value format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attrs::{format_number, parse_number};
use crate::error::TypeResult;

/// How a column renders its raw string value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    #[default]
    Text,
    Number,
    /// Stored as a fraction, shown as a percentage.
    Percent,
}

/// A display column bound to one node attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub format: ValueFormat,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, format: ValueFormat) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            format,
        }
    }

    /// Render a raw attribute value for display. Absent values render empty.
    pub fn display(&self, attr: &str, raw: Option<&str>) -> TypeResult<String> {
        let Some(raw) = raw else {
            return Ok(String::new());
        };
        match self.format {
            ValueFormat::Text => Ok(raw.to_string()),
            ValueFormat::Number => Ok(format_number(parse_number(attr, raw)?)),
            ValueFormat::Percent => Ok(format!(
                "{}%",
                format_number(parse_number(attr, raw)? * 100.0)
            )),
        }
    }
}

/// Lookup from attribute name to display column.
pub trait ColumnResolver {
    fn resolve(&self, attr: &str) -> Option<&ColumnDef>;
}

/// A fixed column table keyed by attribute name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnRegistry {
    columns: BTreeMap<String, ColumnDef>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, attr: impl Into<String>, column: ColumnDef) -> Self {
        self.columns.insert(attr.into(), column);
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl ColumnResolver for ColumnRegistry {
    fn resolve(&self, attr: &str) -> Option<&ColumnDef> {
        self.columns.get(attr)
    }
}

/// Display configuration handed to the blame and change-list builders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContext {
    #[serde(default)]
    pub columns: ColumnRegistry,
}

impl ReportContext {
    pub fn new(columns: ColumnRegistry) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &dyn ColumnResolver {
        &self.columns
    }

    /// Display label for an attribute: the registered column name, or
    /// `fallback` when the attribute has no column.
    pub fn label(&self, attr: &str, fallback: &str) -> String {
        self.columns
            .resolve(attr)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TypeError;

    #[test]
    fn resolves_registered_attributes_only() {
        let registry = ColumnRegistry::new()
            .with_column("Notes", ColumnDef::new("notes", "Notes", ValueFormat::Text));
        assert_eq!(registry.resolve("Notes").map(|c| c.id.as_str()), Some("notes"));
        assert!(registry.resolve("Other").is_none());
    }

    #[test]
    fn display_formats() {
        let number = ColumnDef::new("size", "Size", ValueFormat::Number);
        assert_eq!(number.display("Size", Some("12.500")).unwrap(), "12.5");
        let pct = ColumnDef::new("done", "% Done", ValueFormat::Percent);
        assert_eq!(pct.display("Done", Some("0.25")).unwrap(), "25%");
        let text = ColumnDef::new("notes", "Notes", ValueFormat::Text);
        assert_eq!(text.display("Notes", None).unwrap(), "");
    }

    #[test]
    fn display_propagates_parse_failures() {
        let number = ColumnDef::new("size", "Size", ValueFormat::Number);
        let err = number.display("Size", Some("big")).unwrap_err();
        assert!(matches!(err, TypeError::InvalidNumber { .. }));
    }

    #[test]
    fn context_label_falls_back() {
        let columns = ColumnRegistry::new().with_column(
            "Time",
            ColumnDef::new("time", "Plan Time", ValueFormat::Number),
        );
        let context = ReportContext::new(columns);
        assert_eq!(context.label("Time", "time estimate"), "Plan Time");
        assert_eq!(context.label("Size", "size"), "size");
    }

    #[test]
    fn registry_deserializes_from_map() {
        let json = r#"{"Size": {"id": "size", "name": "Size", "format": "number"}}"#;
        let registry: ColumnRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("Size").unwrap().format, ValueFormat::Number);
    }
}
