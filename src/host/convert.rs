//! Argument coercion against declared parameter tags.
//!
//! Supplied wire values are JSON; declared parameters carry a [`TypeTag`].
//! Scalars coerce with the usual lenient rules (numbers from numeric
//! strings, booleans from `"true"`/`"false"`), date-times must parse as
//! RFC 3339, and structurally complex values pass through the wire
//! serializer untouched. Missing trailing arguments fall back to the
//! declared default, then the tag's zero value. A failed coercion aborts
//! the call before the service is invoked.

// ============================================================================
// Imports
// ============================================================================

use chrono::DateTime;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{ParameterMetadata, TypeTag};

// ============================================================================
// Argument Lists
// ============================================================================

/// Coerces a supplied argument list against a method's parameter table.
///
/// Extra supplied arguments beyond the table are ignored.
///
/// # Errors
///
/// Returns [`Error::Conversion`] naming the parameter that failed.
pub fn coerce_arguments(
    supplied: &[Value],
    parameters: &[ParameterMetadata],
) -> Result<Vec<Value>> {
    parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| match supplied.get(index) {
            Some(value) => coerce_value(value.clone(), parameter.type_tag).map_err(|e| {
                Error::conversion(format!("parameter '{}': {e}", parameter.name))
            }),
            None => Ok(parameter
                .default
                .clone()
                .unwrap_or_else(|| parameter.type_tag.zero_value())),
        })
        .collect()
}

// ============================================================================
// Single Values
// ============================================================================

/// Coerces one value to a declared tag.
///
/// `null` coerces to the tag's zero value regardless of tag.
///
/// # Errors
///
/// Returns [`Error::Conversion`] describing the mismatch.
pub fn coerce_value(value: Value, tag: TypeTag) -> Result<Value> {
    if value.is_null() {
        return Ok(tag.zero_value());
    }

    match tag {
        TypeTag::Text => coerce_text(value),
        TypeTag::Integer => coerce_integer(value),
        TypeTag::Float => coerce_float(value),
        TypeTag::Boolean => coerce_boolean(value),
        TypeTag::DateTime => coerce_date_time(value),
        // Complex values round-trip through the wire serializer as-is.
        TypeTag::Object | TypeTag::Array => Ok(value),
        TypeTag::Void => Ok(Value::Null),
    }
}

fn coerce_text(value: Value) -> Result<Value> {
    match value {
        Value::String(_) => Ok(value),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(mismatch("text", &other)),
    }
}

fn coerce_integer(value: Value) -> Result<Value> {
    match &value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                // Fractional inputs truncate toward zero.
                Ok(Value::from(f as i64))
            } else {
                Err(mismatch("integer", &value))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch("integer", &value)),
        _ => Err(mismatch("integer", &value)),
    }
}

fn coerce_float(value: Value) -> Result<Value> {
    match &value {
        Value::Number(n) => n
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| mismatch("float", &value)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| mismatch("float", &value)),
        _ => Err(mismatch("float", &value)),
    }
}

fn coerce_boolean(value: Value) -> Result<Value> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch("boolean", &value)),
        },
        _ => Err(mismatch("boolean", &value)),
    }
}

fn coerce_date_time(value: Value) -> Result<Value> {
    match &value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|_| value.clone())
            .map_err(|e| Error::conversion(format!("invalid date-time '{s}': {e}"))),
        _ => Err(mismatch("dateTime", &value)),
    }
}

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::conversion(format!("cannot convert {got} to {expected}"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_text_from_number_and_bool() {
        assert_eq!(
            coerce_value(json!(42), TypeTag::Text).expect("coerce"),
            json!("42")
        );
        assert_eq!(
            coerce_value(json!(true), TypeTag::Text).expect("coerce"),
            json!("true")
        );
    }

    #[test]
    fn test_integer_from_string_and_float() {
        assert_eq!(
            coerce_value(json!("17"), TypeTag::Integer).expect("coerce"),
            json!(17)
        );
        assert_eq!(
            coerce_value(json!(3.9), TypeTag::Integer).expect("coerce"),
            json!(3)
        );
    }

    #[test]
    fn test_integer_rejects_garbage() {
        let err = coerce_value(json!("seventeen"), TypeTag::Integer).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
    }

    #[test]
    fn test_boolean_from_string() {
        assert_eq!(
            coerce_value(json!("True"), TypeTag::Boolean).expect("coerce"),
            json!(true)
        );
        assert!(coerce_value(json!("yes"), TypeTag::Boolean).is_err());
    }

    #[test]
    fn test_date_time_validates_rfc3339() {
        let ok = coerce_value(json!("2024-06-01T12:30:00Z"), TypeTag::DateTime);
        assert!(ok.is_ok());

        let err = coerce_value(json!("June 1st"), TypeTag::DateTime).unwrap_err();
        assert!(err.to_string().contains("date-time"));
    }

    #[test]
    fn test_null_becomes_zero_value() {
        assert_eq!(
            coerce_value(Value::Null, TypeTag::Integer).expect("coerce"),
            json!(0)
        );
        assert_eq!(
            coerce_value(Value::Null, TypeTag::Text).expect("coerce"),
            json!("")
        );
    }

    #[test]
    fn test_complex_values_pass_through() {
        let payload = json!({"id": "1", "text": "buy milk"});
        assert_eq!(
            coerce_value(payload.clone(), TypeTag::Object).expect("coerce"),
            payload
        );
    }

    #[test]
    fn test_missing_trailing_args_use_defaults() {
        let params = vec![
            ParameterMetadata::new("text", TypeTag::Text),
            ParameterMetadata::with_default("count", TypeTag::Integer, json!(1)),
            ParameterMetadata::new("flag", TypeTag::Boolean),
        ];

        let args = coerce_arguments(&[json!("hi")], &params).expect("coerce");
        assert_eq!(args, vec![json!("hi"), json!(1), json!(false)]);
    }

    #[test]
    fn test_extra_args_ignored() {
        let params = vec![ParameterMetadata::new("text", TypeTag::Text)];
        let args = coerce_arguments(&[json!("hi"), json!("extra")], &params).expect("coerce");
        assert_eq!(args, vec![json!("hi")]);
    }

    #[test]
    fn test_failed_coercion_names_parameter() {
        let params = vec![ParameterMetadata::new("count", TypeTag::Integer)];
        let err = coerce_arguments(&[json!({})], &params).unwrap_err();
        assert!(err.to_string().contains("count"));
    }
}
