//! Type-directed value coercion
//!
//! Query strings deliver every value as text. Values are converted to the
//! JSON type the target column expects before they are bound, and dates are
//! normalised so that range comparisons work on the stored representation.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use crate::schema::FieldType;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert `value` to the representation bound for a `field_type` column
pub fn coerce_value(field_type: FieldType, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Err("null is not a comparable value; use isNull instead".to_string());
    }
    if value.is_array() || value.is_object() {
        return Err(format!("expected a scalar, got {}", value));
    }

    match field_type {
        FieldType::Integer => to_integer(value),
        FieldType::Float => to_float(value),
        FieldType::Boolean => to_boolean(value),
        FieldType::Date => to_date(value),
        FieldType::DateTime => to_datetime(value),
        FieldType::Id | FieldType::RelatedRecord => to_identifier(value),
        FieldType::Text
        | FieldType::Email
        | FieldType::BigText
        | FieldType::Enum
        | FieldType::MultiEnum => Ok(Value::String(display(value))),
        FieldType::Password | FieldType::Image => Err(format!(
            "values cannot be compared on {} fields",
            field_type.type_name()
        )),
    }
}

/// Order two coerced values of the same type, if they are comparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Text form of a scalar, as it would appear in a query string
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn to_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
            _ => Err(format!("'{}' is not an integer", n)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{}' is not an integer", s)),
        other => Err(format!("'{}' is not an integer", other)),
    }
}

fn to_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{}' is not a number", s)),
        other => Err(format!("'{}' is not a number", other)),
    }
}

fn to_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(format!("'{}' is not a boolean", n)),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

fn to_date(value: &Value) -> Result<Value, String> {
    let text = match value {
        Value::String(s) => s.trim(),
        other => return Err(format!("'{}' is not a date (YYYY-MM-DD)", other)),
    };
    // Grid widgets send dates with a midnight time component
    let date = NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
        .ok_or_else(|| format!("'{}' is not a date (YYYY-MM-DD)", text))?;
    Ok(Value::String(date.format(DATE_FORMAT).to_string()))
}

fn to_datetime(value: &Value) -> Result<Value, String> {
    let text = match value {
        Value::String(s) => s.trim(),
        other => return Err(format!("'{}' is not a datetime", other)),
    };
    let datetime = parse_datetime(text)
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            format!(
                "'{}' is not a datetime (RFC 3339 or YYYY-MM-DD HH:MM:SS)",
                text
            )
        })?;
    Ok(Value::String(datetime.format(DATETIME_FORMAT).to_string()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).ok())
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok())
}

fn to_identifier(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::String(s) if !s.trim().is_empty() => {
            let s = s.trim();
            Ok(s.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::String(s.to_string())))
        }
        other => Err(format!("'{}' is not a record identifier", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings() {
        assert_eq!(coerce_value(FieldType::Integer, &json!("42")).unwrap(), json!(42));
        assert_eq!(coerce_value(FieldType::Float, &json!("7.5")).unwrap(), json!(7.5));
        assert!(coerce_value(FieldType::Integer, &json!("4x")).is_err());
        assert!(coerce_value(FieldType::Float, &json!("NaN")).is_err());
    }

    #[test]
    fn test_booleans() {
        assert_eq!(coerce_value(FieldType::Boolean, &json!("TRUE")).unwrap(), json!(true));
        assert_eq!(coerce_value(FieldType::Boolean, &json!(0)).unwrap(), json!(false));
        assert!(coerce_value(FieldType::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn test_dates_are_normalised() {
        assert_eq!(
            coerce_value(FieldType::Date, &json!("2024-02-29")).unwrap(),
            json!("2024-02-29")
        );
        assert_eq!(
            coerce_value(FieldType::Date, &json!("2024-03-01 00:00:00")).unwrap(),
            json!("2024-03-01")
        );
        assert!(coerce_value(FieldType::Date, &json!("2023-02-29")).is_err());
    }

    #[test]
    fn test_datetimes_are_normalised_to_utc() {
        assert_eq!(
            coerce_value(FieldType::DateTime, &json!("2024-05-01T12:30:00+02:00")).unwrap(),
            json!("2024-05-01 10:30:00")
        );
        assert_eq!(
            coerce_value(FieldType::DateTime, &json!("2024-05-01")).unwrap(),
            json!("2024-05-01 00:00:00")
        );
    }

    #[test]
    fn test_text_accepts_scalars() {
        assert_eq!(coerce_value(FieldType::Text, &json!(1979)).unwrap(), json!("1979"));
        assert!(coerce_value(FieldType::Text, &json!(null)).is_err());
        assert!(coerce_value(FieldType::Text, &json!(["a"])).is_err());
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(coerce_value(FieldType::Id, &json!("17")).unwrap(), json!(17));
        assert_eq!(
            coerce_value(FieldType::RelatedRecord, &json!("a1b2")).unwrap(),
            json!("a1b2")
        );
        assert!(coerce_value(FieldType::Id, &json!(true)).is_err());
    }

    #[test]
    fn test_secrets_take_no_values() {
        assert!(coerce_value(FieldType::Password, &json!("hunter2")).is_err());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(1), &json!(2.5)), Some(Ordering::Less));
        assert_eq!(
            compare_values(&json!("2024-01-02"), &json!("2024-01-01")),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&json!(1), &json!("a")), None);
    }
}
