//! Per-type value coercion.
//!
//! Every [`FieldType`] has exactly one rule here. Coercion never fails:
//! unusable input falls back to a documented default (`0`, today, the first
//! option, ...).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::models::{decode_compound, FieldConfig, FieldType, FormValue};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y%m%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Coerce a raw value (stored or template default) for a field type.
pub fn coerce(field_type: FieldType, config: &FieldConfig, raw: &Value, today: NaiveDate) -> FormValue {
    match field_type {
        FieldType::Text | FieldType::Email | FieldType::Url => FormValue::Text(as_text(raw)),
        FieldType::Select if config.allow_multi_values => coerce_multi_select(&config.options, raw),
        FieldType::Select | FieldType::Radio => coerce_choice(&config.options, raw),
        FieldType::Date => FormValue::Date(coerce_date(raw, today)),
        // Stored values are not parsed for datetime-local.
        FieldType::DatetimeLocal => FormValue::Date(today),
        FieldType::Checkbox => FormValue::Bool(coerce_bool(raw)),
        FieldType::Time => coerce_time(raw),
        FieldType::Number => coerce_number(config, raw),
        FieldType::Items | FieldType::Users | FieldType::Experiments => FormValue::Integer(coerce_integer(raw)),
    }
}

/// String passthrough; `null` becomes empty.
pub fn as_text(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_choice(options: &[String], raw: &Value) -> FormValue {
    let current = as_text(raw);
    if options.contains(&current) {
        return FormValue::Text(current);
    }
    FormValue::Text(options.first().cloned().unwrap_or_default())
}

fn coerce_multi_select(options: &[String], raw: &Value) -> FormValue {
    let selected: Vec<String> = match raw {
        Value::Array(items) => items.iter().map(as_text).collect(),
        Value::Null => Vec::new(),
        other => vec![as_text(other)],
    };
    FormValue::List(selected.into_iter().filter(|s| options.contains(s)).collect())
}

/// Parse a date leniently, defaulting to `today`.
pub fn coerce_date(raw: &Value, today: NaiveDate) -> NaiveDate {
    match raw {
        Value::String(s) => parse_date(s).unwrap_or(today),
        _ => today,
    }
}

/// Parse the date formats commonly found in templates and tables.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn coerce_bool(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "on" | "true" | "1" | "yes"),
        _ => false,
    }
}

fn coerce_time(raw: &Value) -> FormValue {
    let text = as_text(raw);
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text.trim(), fmt).ok())
        .map(FormValue::Time)
        .unwrap_or(FormValue::Text(text))
}

/// Number with optional unit; non-numeric input becomes `0`.
fn coerce_number(config: &FieldConfig, raw: &Value) -> FormValue {
    let (value, stored_unit) = match raw {
        Value::Number(n) => (n.as_f64().unwrap_or(0.0), None),
        Value::String(s) => decode_compound(s).unwrap_or((0.0, None)),
        _ => (0.0, None),
    };

    match resolve_unit(config, stored_unit) {
        Some(unit) => FormValue::Quantity { value, unit },
        None => FormValue::Number(value),
    }
}

/// Pick the unit: prior selection first, then the template's preselection,
/// then the first candidate.
fn resolve_unit(config: &FieldConfig, stored: Option<String>) -> Option<String> {
    let mut preferred = stored.into_iter().chain(config.unit.clone()).filter(|u| !u.is_empty());
    if config.units.is_empty() {
        return preferred.next();
    }
    preferred
        .find(|u| config.units.contains(u))
        .or_else(|| config.units.first().cloned())
}

fn coerce_integer(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
                .unwrap_or(0)
        }
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn config(kind: &str) -> FieldConfig {
        FieldConfig {
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_date_parses_or_defaults() {
        assert_eq!(coerce_date(&json!("2024-01-01"), today()), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(coerce_date(&json!("03/02/2023"), today()), NaiveDate::from_ymd_opt(2023, 2, 3).unwrap());
        assert_eq!(coerce_date(&json!("2023-05-04T10:30"), today()), NaiveDate::from_ymd_opt(2023, 5, 4).unwrap());
    }

    #[test]
    fn test_date_coercion_never_fails() {
        for input in [json!("not a date"), json!(""), json!("2024-13-45"), json!(12), json!(null), json!(["x"])] {
            assert_eq!(coerce(FieldType::Date, &config("date"), &input, today()), FormValue::Date(today()));
        }
    }

    #[test]
    fn test_datetime_local_always_today() {
        let value = coerce(FieldType::DatetimeLocal, &config("datetime-local"), &json!("2020-01-01"), today());
        assert_eq!(value, FormValue::Date(today()));
    }

    #[test]
    fn test_select_defaults_to_first_option() {
        let mut cfg = config("select");
        cfg.options = vec!["a".into(), "b".into()];
        assert_eq!(coerce(FieldType::Select, &cfg, &json!("b"), today()), FormValue::Text("b".into()));
        assert_eq!(coerce(FieldType::Select, &cfg, &json!("z"), today()), FormValue::Text("a".into()));
    }

    #[test]
    fn test_multi_select_drops_unknown() {
        let mut cfg = config("select");
        cfg.options = vec!["a".into(), "b".into()];
        cfg.allow_multi_values = true;
        let value = coerce(FieldType::Select, &cfg, &json!(["b", "z", "a"]), today());
        assert_eq!(value, FormValue::List(vec!["b".into(), "a".into()]));
    }

    #[test]
    fn test_number_fallback_to_zero() {
        assert_eq!(coerce(FieldType::Number, &config("number"), &json!("abc"), today()), FormValue::Number(0.0));
        assert_eq!(coerce(FieldType::Number, &config("number"), &json!("12.5"), today()), FormValue::Number(12.5));
    }

    #[test]
    fn test_number_with_units() {
        let mut cfg = config("number");
        cfg.units = vec!["mm".into(), "cm".into()];
        cfg.unit = Some("cm".into());

        let value = coerce(FieldType::Number, &cfg, &json!("4"), today());
        assert_eq!(value, FormValue::Quantity { value: 4.0, unit: "cm".into() });

        // A stored compound value keeps its unit.
        let value = coerce(FieldType::Number, &cfg, &json!("3.5||mm"), today());
        assert_eq!(value, FormValue::Quantity { value: 3.5, unit: "mm".into() });

        // Unknown stored unit falls back to the preselection.
        let value = coerce(FieldType::Number, &cfg, &json!("1||km"), today());
        assert_eq!(value, FormValue::Quantity { value: 1.0, unit: "cm".into() });
    }

    #[test]
    fn test_number_units_without_preselection() {
        let mut cfg = config("number");
        cfg.units = vec!["kV".into(), "V".into()];
        let value = coerce(FieldType::Number, &cfg, &json!(30), today());
        assert_eq!(value, FormValue::Quantity { value: 30.0, unit: "kV".into() });
    }

    #[test]
    fn test_integer_types() {
        assert_eq!(coerce(FieldType::Items, &config("items"), &json!("42"), today()), FormValue::Integer(42));
        assert_eq!(coerce(FieldType::Users, &config("users"), &json!("bob"), today()), FormValue::Integer(0));
        assert_eq!(coerce(FieldType::Experiments, &config("experiments"), &json!(7.9), today()), FormValue::Integer(7));
    }

    #[test]
    fn test_checkbox_and_time() {
        assert_eq!(coerce(FieldType::Checkbox, &config("checkbox"), &json!("on"), today()), FormValue::Bool(true));
        assert_eq!(coerce(FieldType::Checkbox, &config("checkbox"), &json!(null), today()), FormValue::Bool(false));
        assert_eq!(
            coerce(FieldType::Time, &config("time"), &json!("09:30"), today()),
            FormValue::Time(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
    }
}
