//! Form generation engine.
//!
//! Turns a [`TemplateMetadata`] into an ordered, grouped sequence of fields,
//! resolves each field's working value (stored value first, template default
//! otherwise), hands it to a [`FieldRenderer`] and commits what comes back
//! into the session's [`CollectedFormData`].
//!
//! ```text
//! extra_fields ──sort by position──▶ [f1, f2 | f3, f4 | f5]
//!                                          ▲        ▲
//!                                  separator on group_id change
//! ```

pub mod coerce;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{CollectedFormData, FieldConfig, FieldDescriptor, FieldType, FormValue, TemplateMetadata};
use crate::error::SchemaResult;
use crate::validation::ValidationState;

pub use coerce::{coerce, parse_date};

/// One element of the rendered form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormItem {
    /// Divider between two groups.
    Separator,
    /// A field with its working value.
    Field(FieldDescriptor),
}

/// Presents a field and returns the value the user committed.
///
/// The visual side is not part of this crate; a UI implements this trait.
pub trait FieldRenderer {
    /// Render `field`; `disabled` means the value cannot be edited.
    fn render(&mut self, field: &FieldDescriptor, disabled: bool) -> FormValue;

    /// Draw a group divider.
    fn separator(&mut self) {}
}

/// Renderer that commits every working value unchanged.
///
/// Used for headless generation (CLI, HTTP API, previews).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRenderer;

impl FieldRenderer for DefaultRenderer {
    fn render(&mut self, field: &FieldDescriptor, _disabled: bool) -> FormValue {
        field.value.clone()
    }
}

/// Result of one form generation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormOutcome {
    /// Fields and separators in display order, carrying committed values.
    pub items: Vec<FormItem>,
    /// Committed values of required fields.
    pub required: Vec<(String, FormValue)>,
}

impl FormOutcome {
    /// Every required field holds a truthy value.
    pub fn is_valid(&self) -> bool {
        self.required.iter().all(|(_, value)| value.is_truthy())
    }

    /// Number of group separators emitted.
    pub fn separators(&self) -> usize {
        self.items.iter().filter(|item| matches!(item, FormItem::Separator)).count()
    }

    /// Names of required fields that are still empty.
    pub fn missing_required(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|(_, value)| !value.is_truthy())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Sort fields by position (stable) and insert group separators.
///
/// Working values come from `collected` when present, else from the template
/// defaults. Fails on the first unknown field type.
pub fn layout(template: &TemplateMetadata, collected: &CollectedFormData, today: NaiveDate) -> SchemaResult<Vec<FormItem>> {
    let mut fields: Vec<(&String, &FieldConfig)> = template.extra_fields.iter().collect();
    // `sort_by_key` is stable: equal positions keep file order.
    fields.sort_by_key(|(_, config)| config.sort_position());

    let mut items = Vec::with_capacity(fields.len());
    let mut current_group = fields.first().map(|(_, config)| config.group_id.unwrap_or(0));

    for (name, config) in fields {
        let group_id = config.group_id.unwrap_or(0);
        if current_group != Some(group_id) {
            items.push(FormItem::Separator);
            current_group = Some(group_id);
        }
        items.push(FormItem::Field(describe(name, config, collected.get(name), today)?));
    }

    Ok(items)
}

/// Build the descriptor of one field.
pub fn describe(
    name: &str,
    config: &FieldConfig,
    stored: Option<&FormValue>,
    today: NaiveDate,
) -> SchemaResult<FieldDescriptor> {
    let field_type = config.field_type(name)?;
    let raw = match stored {
        Some(value) => value.to_json(),
        None => config.value.clone(),
    };
    let value = coerce(field_type, config, &raw, today);

    // A resolved unit wins over the template preselection.
    let unit = match &value {
        FormValue::Quantity { unit, .. } => Some(unit.clone()),
        _ => config.unit.clone(),
    };

    Ok(FieldDescriptor {
        name: name.to_string(),
        field_type,
        value,
        description: config.description.clone().unwrap_or_default(),
        options: config.options.clone(),
        required: config.required,
        position: config.sort_position(),
        group_id: config.group_id.unwrap_or(0),
        allow_multi_values: config.allow_multi_values,
        unit,
        units: config.units.clone(),
        readonly: config.readonly,
    })
}

/// Generate the form for `template`, committing values into `collected`.
///
/// Email and URL values are checked when the renderer changed them; a
/// failure flags `validation` but the value is committed anyway.
pub fn generate_form<R: FieldRenderer + ?Sized>(
    template: &TemplateMetadata,
    collected: &mut CollectedFormData,
    renderer: &mut R,
    validation: &mut ValidationState,
    disabled: bool,
) -> SchemaResult<FormOutcome> {
    generate_form_on(template, collected, renderer, validation, disabled, today())
}

/// [`generate_form`] with an explicit "today".
pub fn generate_form_on<R: FieldRenderer + ?Sized>(
    template: &TemplateMetadata,
    collected: &mut CollectedFormData,
    renderer: &mut R,
    validation: &mut ValidationState,
    disabled: bool,
    today: NaiveDate,
) -> SchemaResult<FormOutcome> {
    let items = layout(template, collected, today)?;
    let mut outcome = FormOutcome::default();

    for item in items {
        let mut field = match item {
            FormItem::Separator => {
                renderer.separator();
                outcome.items.push(FormItem::Separator);
                continue;
            }
            FormItem::Field(field) => field,
        };

        let committed = renderer.render(&field, disabled || field.readonly);

        if committed != field.value {
            if let FormValue::Text(text) = &committed {
                match field.field_type {
                    FieldType::Email => {
                        validation.check_email(&field.name, text);
                    }
                    FieldType::Url => {
                        validation.check_url(&field.name, text);
                    }
                    _ => {}
                }
            }
        }

        if field.required {
            outcome.required.push((field.name.clone(), committed.clone()));
        }
        collected.insert(field.name.clone(), committed.clone());
        field.value = committed;
        outcome.items.push(FormItem::Field(field));
    }

    Ok(outcome)
}

/// Local date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn template(raw: serde_json::Value) -> TemplateMetadata {
        serde_json::from_value(raw).unwrap()
    }

    fn field_names(items: &[FormItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                FormItem::Separator => "|".to_string(),
                FormItem::Field(f) => f.name.clone(),
            })
            .collect()
    }

    /// Renderer returning scripted values by field name.
    struct Scripted(Vec<(&'static str, FormValue)>);

    impl FieldRenderer for Scripted {
        fn render(&mut self, field: &FieldDescriptor, _disabled: bool) -> FormValue {
            self.0
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| field.value.clone())
        }
    }

    #[test]
    fn test_sorted_by_position_with_stable_ties() {
        let tmpl = template(json!({ "extra_fields": {
            "c": { "position": 2 },
            "a": { "position": 1 },
            "nopos": {},
            "b": { "position": 1 }
        }}));
        let items = layout(&tmpl, &CollectedFormData::new(), date()).unwrap();
        assert_eq!(field_names(&items), vec!["nopos", "a", "b", "c"]);
    }

    #[test]
    fn test_group_separators() {
        let tmpl = template(json!({ "extra_fields": {
            "a": { "position": 1, "group_id": 1 },
            "b": { "position": 2, "group_id": 1 },
            "c": { "position": 3, "group_id": 2 },
            "d": { "position": 4, "group_id": 1 },
            "e": { "position": 5, "group_id": 1 }
        }}));
        let items = layout(&tmpl, &CollectedFormData::new(), date()).unwrap();
        assert_eq!(field_names(&items), vec!["a", "b", "|", "c", "|", "d", "e"]);
    }

    #[test]
    fn test_no_separator_before_first_field() {
        let tmpl = template(json!({ "extra_fields": { "a": { "group_id": 3 } }}));
        let items = layout(&tmpl, &CollectedFormData::new(), date()).unwrap();
        assert_eq!(field_names(&items), vec!["a"]);
    }

    #[test]
    fn test_unknown_type_fails() {
        let tmpl = template(json!({ "extra_fields": { "a": { "type": "slider" } }}));
        assert!(layout(&tmpl, &CollectedFormData::new(), date()).is_err());
    }

    #[test]
    fn test_stored_value_wins_over_default() {
        let tmpl = template(json!({ "extra_fields": {
            "lens": { "type": "text", "value": "x10" },
            "voltage": { "type": "number", "value": "1", "units": ["V", "kV"], "unit": "V" }
        }}));
        let mut collected = CollectedFormData::new();
        collected.insert("lens".into(), FormValue::Text("x50".into()));
        collected.insert("voltage".into(), FormValue::Quantity { value: 30.0, unit: "kV".into() });

        let items = layout(&tmpl, &collected, date()).unwrap();
        let FormItem::Field(lens) = &items[0] else { panic!("expected field") };
        let FormItem::Field(voltage) = &items[1] else { panic!("expected field") };
        assert_eq!(lens.value, FormValue::Text("x50".into()));
        assert_eq!(voltage.value, FormValue::Quantity { value: 30.0, unit: "kV".into() });
        assert_eq!(voltage.unit.as_deref(), Some("kV"));
    }

    #[test]
    fn test_generate_commits_and_tracks_required() {
        let tmpl = template(json!({ "extra_fields": {
            "operator": { "type": "text", "value": "", "required": true },
            "count": { "type": "items", "value": "3", "required": true }
        }}));
        let mut collected = CollectedFormData::new();
        let mut validation = ValidationState::default();

        let outcome = generate_form_on(&tmpl, &mut collected, &mut DefaultRenderer, &mut validation, false, date()).unwrap();
        assert!(!outcome.is_valid());
        assert_eq!(outcome.missing_required(), vec!["operator"]);
        assert_eq!(collected["count"], FormValue::Integer(3));

        let mut renderer = Scripted(vec![("operator", FormValue::Text("Ada".into()))]);
        let outcome = generate_form_on(&tmpl, &mut collected, &mut renderer, &mut validation, false, date()).unwrap();
        assert!(outcome.is_valid());
        assert_eq!(collected["operator"], FormValue::Text("Ada".into()));
    }

    #[test]
    fn test_readonly_forces_disabled() {
        struct Spy(Vec<bool>);
        impl FieldRenderer for Spy {
            fn render(&mut self, field: &FieldDescriptor, disabled: bool) -> FormValue {
                self.0.push(disabled);
                field.value.clone()
            }
        }

        let tmpl = template(json!({ "extra_fields": {
            "a": { "position": 1, "readonly": true, "value": "fixed" },
            "b": { "position": 2 }
        }}));
        let mut collected = CollectedFormData::new();
        let mut spy = Spy(Vec::new());
        generate_form_on(&tmpl, &mut collected, &mut spy, &mut ValidationState::default(), false, date()).unwrap();

        assert_eq!(spy.0, vec![true, false]);
        assert_eq!(collected["a"], FormValue::Text("fixed".into()));
    }

    #[test]
    fn test_invalid_email_flags_but_commits() {
        let tmpl = template(json!({ "extra_fields": { "contact": { "type": "email", "value": "" } }}));
        let mut collected = CollectedFormData::new();
        let mut validation = ValidationState::default();
        let mut renderer = Scripted(vec![("contact", FormValue::Text("not-an-email".into()))]);

        generate_form_on(&tmpl, &mut collected, &mut renderer, &mut validation, false, date()).unwrap();
        assert!(validation.has_error());
        assert_eq!(collected["contact"], FormValue::Text("not-an-email".into()));
    }
}
