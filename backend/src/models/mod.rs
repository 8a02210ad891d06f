//! Domain models for the ElabLite metadata pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`TemplateMetadata`] - Normalized template schema (`extra_fields`)
//! - [`FieldConfig`] - Raw per-field configuration as found in templates
//! - [`FieldType`] - Closed set of supported field types
//! - [`FieldDescriptor`] - A field ready to render, with its working value
//! - [`FormValue`] - A committed field value (scalar or number with unit)
//! - [`ExperimentBaseMetadata`] - Title, date, author, technique, ...
//! - [`RowTable`] - Per-analysis table edited by the user
//! - [`TechniqueOption`] - Entry of the technique catalog

pub mod table;
pub mod technique;

pub use table::{cell_to_string, Row, RowTable, FILENAME, IDENTIFIER_ANALYSIS, LOCALISATION_ANALYSIS, NEW_FILENAME, NEW_TITLE, OBJECT, OBJECT_SAMPLE, RESERVED_COLUMNS};
pub use technique::{register_technique, technique, techniques, TechniqueOption};

use chrono::{NaiveDate, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult};

/// Separator of the flat `"<number>||<unit>"` encoding.
pub const COMPOUND_SEPARATOR: &str = "||";

// =============================================================================
// Field Type
// =============================================================================

/// Type of a template field.
///
/// Each variant maps to exactly one coercion rule in [`crate::form`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Select,
    Date,
    DatetimeLocal,
    Checkbox,
    Email,
    Time,
    Number,
    Url,
    Radio,
    Items,
    Users,
    Experiments,
}

impl FieldType {
    /// Parse the template's `type` string.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim() {
            "text" => Some(Self::Text),
            "select" => Some(Self::Select),
            "date" => Some(Self::Date),
            "datetime-local" | "datetime_local" => Some(Self::DatetimeLocal),
            "checkbox" => Some(Self::Checkbox),
            "email" => Some(Self::Email),
            "time" => Some(Self::Time),
            "number" => Some(Self::Number),
            "url" => Some(Self::Url),
            "radio" => Some(Self::Radio),
            "items" => Some(Self::Items),
            "users" => Some(Self::Users),
            "experiments" => Some(Self::Experiments),
            _ => None,
        }
    }

    /// Name as written in templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Select => "select",
            Self::Date => "date",
            Self::DatetimeLocal => "datetime-local",
            Self::Checkbox => "checkbox",
            Self::Email => "email",
            Self::Time => "time",
            Self::Number => "number",
            Self::Url => "url",
            Self::Radio => "radio",
            Self::Items => "items",
            Self::Users => "users",
            Self::Experiments => "experiments",
        }
    }
}

// =============================================================================
// Raw Template Schema
// =============================================================================

/// Raw configuration of one field, as stored under `extra_fields`.
///
/// Unknown keys are kept in `extra` so a template survives a
/// parse/serialize cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field type name; absent means `text`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Default value.
    #[serde(default)]
    pub value: Value,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_multi_values: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub readonly: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldConfig {
    /// Resolve the field type, failing on unknown names.
    pub fn field_type(&self, field: &str) -> SchemaResult<FieldType> {
        let kind = self.kind.as_deref().unwrap_or("text");
        FieldType::parse(kind).ok_or_else(|| SchemaError::UnknownFieldType {
            field: field.to_string(),
            kind: kind.to_string(),
        })
    }

    /// Sort key; a missing position sorts first.
    pub fn sort_position(&self) -> i64 {
        self.position.unwrap_or(-1)
    }
}

/// Positions and group ids show up both as numbers and numeric strings.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Normalized template metadata.
///
/// Keys other than `extra_fields` (e.g. elabFTW group definitions) are kept
/// verbatim in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    #[serde(default)]
    pub extra_fields: IndexMap<String, FieldConfig>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl TemplateMetadata {
    /// Whether the template declares no field at all.
    pub fn is_empty(&self) -> bool {
        self.extra_fields.is_empty()
    }

    /// Check every field type up front.
    pub fn validate(&self) -> SchemaResult<()> {
        for (name, config) in &self.extra_fields {
            config.field_type(name)?;
        }
        Ok(())
    }
}

// =============================================================================
// Form Values
// =============================================================================

/// A committed form value.
///
/// Numbers carrying a unit are a proper pair instead of the flat
/// `"<number>||<unit>"` string; [`FormValue::to_compound`] and
/// [`decode_compound`] convert between the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FormValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    List(Vec<String>),
    Quantity { value: f64, unit: String },
}

impl FormValue {
    /// Truthiness used by the required-field gate.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Number(n) => *n != 0.0,
            Self::Integer(n) => *n != 0,
            Self::Bool(b) => *b,
            Self::Date(_) | Self::Time(_) => true,
            Self::List(items) => !items.is_empty(),
            Self::Quantity { value, .. } => *value != 0.0,
        }
    }

    /// Flat string form, compound-encoded for quantities.
    pub fn to_compound(&self) -> String {
        match self {
            Self::Quantity { value, unit } => encode_compound(*value, unit),
            other => other.to_plain_string(),
        }
    }

    /// JSON scalar as stored in a template `value`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Integer(n) => Value::from(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => Value::String(t.format("%H:%M").to_string()),
            Self::List(items) => Value::from(items.clone()),
            Self::Quantity { .. } => Value::String(self.to_compound()),
        }
    }

    fn to_plain_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Time(t) => t.format("%H:%M").to_string(),
            Self::List(items) => items.join(", "),
            Self::Quantity { value, .. } => value.to_string(),
        }
    }
}

/// Encode a number and its unit as `"<number>||<unit>"`.
pub fn encode_compound(value: f64, unit: &str) -> String {
    format!("{}{}{}", value, COMPOUND_SEPARATOR, unit)
}

/// Decode `"<number>||<unit>"` (or a plain number) into its parts.
///
/// Splits on the first `||`; an empty unit decodes as `None`.
/// Returns `None` when the numeric part does not parse.
pub fn decode_compound(raw: &str) -> Option<(f64, Option<String>)> {
    let (number, unit) = match raw.split_once(COMPOUND_SEPARATOR) {
        Some((number, unit)) => (number, Some(unit.trim())),
        None => (raw, None),
    };
    let value = number.trim().parse::<f64>().ok()?;
    let unit = unit.filter(|u| !u.is_empty()).map(String::from);
    Some((value, unit))
}

/// Committed values keyed by field name, in commit order.
pub type CollectedFormData = IndexMap<String, FormValue>;

// =============================================================================
// Field Descriptor
// =============================================================================

/// One configured field, resolved and ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Working value after coercion.
    pub value: FormValue,
    pub description: String,
    pub options: Vec<String>,
    pub required: bool,
    pub position: i64,
    pub group_id: i64,
    pub allow_multi_values: bool,
    pub unit: Option<String>,
    pub units: Vec<String>,
    pub readonly: bool,
}

impl FieldDescriptor {
    /// Human label: `sample_size` becomes `Sample Size`.
    pub fn label(&self) -> String {
        self.name
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

// =============================================================================
// Experiment Base Metadata
// =============================================================================

/// Generic information of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentBaseMetadata {
    pub title: String,
    pub date: NaiveDate,
    pub author: String,
    #[serde(default)]
    pub commentary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Star rating, 0 to 5.
    #[serde(default, deserialize_with = "clamped_rating")]
    pub rating: u8,
    #[serde(default)]
    pub technical: Option<TechniqueOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_longname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_shortname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_uri: Option<String>,
}

/// Highest star rating.
pub const MAX_RATING: u8 = 5;

/// Maximum number of tags on an experiment.
pub const MAX_TAGS: usize = 8;

/// Ratings above the maximum are clamped.
fn clamped_rating<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let rating = u64::deserialize(deserializer)?;
    Ok(rating.min(u64::from(MAX_RATING)) as u8)
}

impl ExperimentBaseMetadata {
    /// Create base metadata with the mandatory fields.
    pub fn new(title: impl Into<String>, date: NaiveDate, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date,
            author: author.into(),
            commentary: String::new(),
            tags: Vec::new(),
            rating: 0,
            technical: None,
            project_longname: None,
            project_shortname: None,
            project_uri: None,
        }
    }

    /// Set the technique.
    pub fn with_technique(mut self, technique: TechniqueOption) -> Self {
        self.technical = Some(technique);
        self
    }

    /// Set the rating, clamped to 0..=5.
    pub fn set_rating(&mut self, rating: u8) {
        self.rating = rating.min(MAX_RATING);
    }

    /// Add a tag; duplicates and tags beyond the limit are ignored.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() && self.tags.len() < MAX_TAGS && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Technique code, if one is selected.
    pub fn technique_code(&self) -> Option<&str> {
        self.technical.as_ref().map(|t| t.code.as_str())
    }

    /// Title, date, author and technique are all set.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.author.trim().is_empty() && self.technical.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("number"), Some(FieldType::Number));
        assert_eq!(FieldType::parse("datetime-local"), Some(FieldType::DatetimeLocal));
        assert_eq!(FieldType::parse("slider"), None);
    }

    #[test]
    fn test_unknown_type_is_schema_error() {
        let config = FieldConfig {
            kind: Some("slider".into()),
            ..Default::default()
        };
        let err = config.field_type("power").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFieldType { .. }));
    }

    #[test]
    fn test_missing_type_defaults_to_text() {
        let config = FieldConfig::default();
        assert_eq!(config.field_type("x").unwrap(), FieldType::Text);
    }

    #[test]
    fn test_compound_round_trip() {
        let encoded = FormValue::Quantity { value: 3.5, unit: "mm".into() }.to_compound();
        assert_eq!(encoded, "3.5||mm");
        assert_eq!(decode_compound(&encoded), Some((3.5, Some("mm".to_string()))));
    }

    #[test]
    fn test_decode_plain_number() {
        assert_eq!(decode_compound("42"), Some((42.0, None)));
        assert_eq!(decode_compound("12||"), Some((12.0, None)));
        assert_eq!(decode_compound("abc||mm"), None);
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        assert_eq!(decode_compound("1||a||b"), Some((1.0, Some("a||b".to_string()))));
    }

    #[test]
    fn test_truthiness() {
        assert!(!FormValue::Text(String::new()).is_truthy());
        assert!(!FormValue::Integer(0).is_truthy());
        assert!(!FormValue::Quantity { value: 0.0, unit: "mm".into() }.is_truthy());
        assert!(FormValue::Text("x".into()).is_truthy());
        assert!(FormValue::Bool(true).is_truthy());
    }

    #[test]
    fn test_template_keeps_order_and_unknown_keys() {
        let raw = json!({
            "extra_fields": {
                "zeta": { "type": "text", "value": "z", "blank_value_on_duplicate": false },
                "alpha": { "type": "number", "value": "1", "position": "2", "units": ["mm", "cm"] }
            },
            "elabftw": { "extra_fields_groups": [{ "id": 1, "name": "Optics" }] }
        });
        let template: TemplateMetadata = serde_json::from_value(raw).unwrap();

        let names: Vec<&String> = template.extra_fields.keys().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(template.extra_fields["alpha"].position, Some(2));
        assert!(template.other.contains_key("elabftw"));

        let back = serde_json::to_value(&template).unwrap();
        assert_eq!(back["extra_fields"]["zeta"]["blank_value_on_duplicate"], false);
    }

    #[test]
    fn test_field_label() {
        let descriptor = FieldDescriptor {
            name: "sample_size".into(),
            field_type: FieldType::Number,
            value: FormValue::Number(0.0),
            description: String::new(),
            options: vec![],
            required: false,
            position: -1,
            group_id: 0,
            allow_multi_values: false,
            unit: None,
            units: vec![],
            readonly: false,
        };
        assert_eq!(descriptor.label(), "Sample Size");
    }

    #[test]
    fn test_base_metadata_completeness() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let base = ExperimentBaseMetadata::new("T1", date, "A");
        assert!(!base.is_complete());

        let base = base.with_technique(technique("XRF").unwrap());
        assert!(base.is_complete());
        assert_eq!(base.technique_code(), Some("XRF"));
    }

    #[test]
    fn test_rating_clamped() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut base = ExperimentBaseMetadata::new("T1", date, "A");
        base.set_rating(9);
        assert_eq!(base.rating, 5);

        let parsed: ExperimentBaseMetadata = serde_json::from_value(json!({
            "title": "T1", "date": "2024-01-01", "author": "A", "rating": 9
        }))
        .unwrap();
        assert_eq!(parsed.rating, MAX_RATING);

        let preset = rmp_serde::to_vec_named(&json!({
            "title": "T1", "date": "2024-01-01", "author": "A", "rating": 200
        }))
        .unwrap();
        let parsed: ExperimentBaseMetadata = rmp_serde::from_slice(&preset).unwrap();
        assert_eq!(parsed.rating, MAX_RATING);
    }

    #[test]
    fn test_tags_deduplicated_and_capped() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut base = ExperimentBaseMetadata::new("T1", date, "A");
        base.add_tag("xrf");
        base.add_tag("xrf");
        base.add_tag("");
        assert_eq!(base.tags, ["xrf"]);

        for i in 0..20 {
            base.add_tag(format!("tag{}", i));
        }
        assert_eq!(base.tags.len(), MAX_TAGS);
    }

    #[test]
    fn test_technical_with_code_only() {
        let base: ExperimentBaseMetadata = serde_json::from_value(json!({
            "title": "T1", "date": "2024-01-01", "author": "A",
            "technical": { "code": "XRF" }
        }))
        .unwrap();
        assert_eq!(base.technique_code(), Some("XRF"));
    }
}
