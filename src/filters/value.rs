//! Filter value coercion
//!
//! Query-string values are plain text; each condition's value is parsed
//! according to the target field's type and the operator. Unparseable values
//! are `InvalidFilter` errors rather than silent mismatches.

use serde_json::Value;

use super::Operator;
use crate::errors::ApiError;
use crate::fields::{parse_bool_token, parse_date, parse_datetime, parse_time, FieldType};
use crate::store::DocumentId;

/// Tokens that read as null for non-string equality targets
const NULL_TOKENS: [&str; 5] = ["", "nil", "null", "none", "None"];

fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw)
}

/// Parse one filter value for `field_type` under `operator`
pub fn parse_filter_value(
    field_name: &str,
    field_type: &FieldType,
    operator: Operator,
    raw: &str,
) -> Result<Value, ApiError> {
    if operator.is_match() {
        // Admissibility restricts match operators to string fields
        return Ok(Value::String(raw.to_string()));
    }
    match operator {
        Operator::Exists => Ok(parse_bool_token(raw).map_or(Value::Null, Value::Bool)),
        Operator::Size => raw.parse::<i64>().map(Value::from).map_err(|_| {
            invalid(field_name, operator, raw, "expected an integer size")
        }),
        _ if operator.is_list() => parse_list(field_name, field_type, operator, raw),
        // ToMany equality compares whole reference lists
        Operator::Exact | Operator::Ne if field_type.is_to_many() => {
            parse_list(field_name, field_type, operator, raw)
        }
        _ => parse_scalar(field_name, field_type, operator, raw),
    }
}

/// Comma-separated list value; a bare value reads as a one-element list
///
/// Null-ish elements are dropped for non-string fields, so `in=''` yields an
/// empty list (matching nothing) instead of an error.
fn parse_list(
    field_name: &str,
    field_type: &FieldType,
    operator: Operator,
    raw: &str,
) -> Result<Value, ApiError> {
    let mut items = Vec::new();
    for element in raw.split(',') {
        if matches!(field_type, FieldType::String) {
            items.push(Value::String(element.to_string()));
        } else if is_null_token(element) {
            continue;
        } else {
            items.push(parse_scalar(field_name, field_type, operator, element)?);
        }
    }
    Ok(Value::Array(items))
}

fn parse_scalar(
    field_name: &str,
    field_type: &FieldType,
    operator: Operator,
    raw: &str,
) -> Result<Value, ApiError> {
    if !matches!(field_type, FieldType::String) && is_null_token(raw) {
        return Ok(Value::Null);
    }
    match field_type {
        FieldType::String => Ok(Value::String(raw.to_string())),
        FieldType::Id | FieldType::ToOne | FieldType::ToMany => {
            match DocumentId::from_uri_or_id(raw) {
                Some(id) => Ok(Value::String(id.to_string())),
                None => Err(invalid(
                    field_name,
                    operator,
                    raw,
                    "expected a document id or resource URI",
                )),
            }
        }
        // Fractional input rounds half away from zero
        FieldType::Integer => match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Value::from(number.round() as i64)),
            _ => Err(invalid(field_name, operator, raw, "expected an integer")),
        },
        FieldType::Float => match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Value::from(number)),
            _ => Err(invalid(field_name, operator, raw, "expected a float")),
        },
        FieldType::Boolean => Ok(parse_bool_token(raw).map_or(Value::Null, Value::Bool)),
        FieldType::Date => parse_date(raw)
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| invalid(field_name, operator, raw, "expected a date")),
        FieldType::DateTime => parse_datetime(raw)
            .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .ok_or_else(|| invalid(field_name, operator, raw, "expected a datetime")),
        FieldType::Time => parse_time(raw)
            .map(|time| Value::String(time.format("%H:%M:%S%.f").to_string()))
            .ok_or_else(|| invalid(field_name, operator, raw, "expected a time")),
        FieldType::List | FieldType::Object | FieldType::Embedded(_) => Err(invalid(
            field_name,
            operator,
            raw,
            "only `exists` and `size` apply to this field",
        )),
    }
}

fn invalid(field_name: &str, operator: Operator, raw: &str, detail: &str) -> ApiError {
    ApiError::InvalidFilter(format!(
        "value `{raw}` for `{field_name}__{}`: {detail}",
        operator.as_str()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_values_round() {
        let parse = |raw| {
            parse_filter_value("age", &FieldType::Integer, Operator::Exact, raw).unwrap()
        };
        assert_eq!(parse("10"), json!(10));
        assert_eq!(parse("3.2"), json!(3));
        assert_eq!(parse("3.5"), json!(4));
        assert_eq!(parse("-1.9"), json!(-2));
        assert!(
            parse_filter_value("age", &FieldType::Integer, Operator::Exact, "ten").is_err()
        );
    }

    #[test]
    fn test_null_tokens_for_non_string_fields() {
        for raw in ["", "nil", "null", "none", "None"] {
            assert_eq!(
                parse_filter_value("age", &FieldType::Integer, Operator::Exact, raw).unwrap(),
                Value::Null
            );
        }
        // Strings keep the literal text
        assert_eq!(
            parse_filter_value("name", &FieldType::String, Operator::Exact, "None").unwrap(),
            json!("None")
        );
    }

    #[test]
    fn test_boolean_tokens() {
        for raw in ["true", "True", "t", "1"] {
            assert_eq!(
                parse_filter_value("done", &FieldType::Boolean, Operator::Exact, raw).unwrap(),
                json!(true)
            );
        }
        for raw in ["false", "False", "f", "0"] {
            assert_eq!(
                parse_filter_value("done", &FieldType::Boolean, Operator::Exact, raw).unwrap(),
                json!(false)
            );
        }
        assert_eq!(
            parse_filter_value("done", &FieldType::Boolean, Operator::Exact, "maybe").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_list_values_coerce_and_drop_nulls() {
        assert_eq!(
            parse_filter_value("age", &FieldType::Integer, Operator::In, "1,2,3").unwrap(),
            json!([1, 2, 3])
        );
        // Scalar becomes a one-element list
        assert_eq!(
            parse_filter_value("age", &FieldType::Integer, Operator::In, "7").unwrap(),
            json!([7])
        );
        // Empty string yields the empty list for non-string fields
        assert_eq!(
            parse_filter_value("age", &FieldType::Integer, Operator::In, "").unwrap(),
            json!([])
        );
        // String fields keep empty elements
        assert_eq!(
            parse_filter_value("name", &FieldType::String, Operator::In, "").unwrap(),
            json!([""])
        );
    }

    #[test]
    fn test_id_values_accept_uris() {
        let id = DocumentId::new();
        let uri = format!("/api/v1/person/{id}/");
        assert_eq!(
            parse_filter_value("author", &FieldType::ToOne, Operator::Exact, &uri).unwrap(),
            json!(id.to_string())
        );
        assert!(
            parse_filter_value("author", &FieldType::ToOne, Operator::Exact, "bogus").is_err()
        );
    }

    #[test]
    fn test_to_many_equality_parses_to_id_list() {
        let id = DocumentId::new();
        let value =
            parse_filter_value("tags", &FieldType::ToMany, Operator::Exact, &id.to_string())
                .unwrap();
        assert_eq!(value, json!([id.to_string()]));

        // Null-ish elements drop out
        let value = parse_filter_value("tags", &FieldType::ToMany, Operator::Exact, "")
            .unwrap();
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_exists_and_size() {
        assert_eq!(
            parse_filter_value("tags", &FieldType::List, Operator::Exists, "true").unwrap(),
            json!(true)
        );
        assert_eq!(
            parse_filter_value("tags", &FieldType::List, Operator::Exists, "whatever")
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            parse_filter_value("tags", &FieldType::List, Operator::Size, "2").unwrap(),
            json!(2)
        );
        assert!(
            parse_filter_value("tags", &FieldType::List, Operator::Size, "2.5").is_err()
        );
    }

    #[test]
    fn test_datetime_values_normalize() {
        assert_eq!(
            parse_filter_value(
                "added",
                &FieldType::DateTime,
                Operator::Gte,
                "2011-12-01T15:30:00+02:00"
            )
            .unwrap(),
            json!("2011-12-01T13:30:00")
        );
        assert_eq!(
            parse_filter_value("born", &FieldType::Date, Operator::Exact, "2011-12-01")
                .unwrap(),
            json!("2011-12-01")
        );
    }
}
