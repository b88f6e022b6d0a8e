//! Validation module
//!
//! Save flows collect problems per field instead of failing on the first
//! one, so a client sees everything wrong with its data at once. The
//! schema-driven required check always runs; resources may plug in a
//! `Validator` for anything beyond it.

use serde_json::Value;

use crate::bundle::Bundle;
use crate::errors::ValidationErrors;
use crate::fields::ApiField;

/// Custom per-resource validation hook
pub trait Validator: Send + Sync {
    /// Record problems with the bundle's document in `errors`
    fn validate(&self, bundle: &Bundle, errors: &mut ValidationErrors);
}

/// Accepts everything; the default
pub struct NoValidation;

impl Validator for NoValidation {
    fn validate(&self, _bundle: &Bundle, _errors: &mut ValidationErrors) {}
}

/// Require every `required` field to be present and non-null
///
/// A required to-many reference must also be non-empty.
pub fn check_required_fields(
    fields: &[ApiField],
    bundle: &Bundle,
    errors: &mut ValidationErrors,
) {
    for field in fields {
        if !field.required {
            continue;
        }
        let value = bundle.document.get(field.attribute_name());
        let missing = match value {
            None | Some(Value::Null) => true,
            Some(Value::Array(items)) if field.is_to_many() => items.is_empty(),
            Some(_) => false,
        };
        if missing {
            errors
                .entry(field.name.clone())
                .or_default()
                .push("this field is required".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_fields_are_reported_together() {
        let fields = vec![
            ApiField::string("name").required(true),
            ApiField::integer("age").required(true),
            ApiField::string("nickname"),
        ];
        let mut bundle = Bundle::default();
        bundle.document.insert("name".to_string(), Value::Null);

        let mut errors = ValidationErrors::new();
        check_required_fields(&fields, &bundle, &mut errors);
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("age"));
        assert!(!errors.contains_key("nickname"));
    }

    #[test]
    fn test_required_to_many_must_be_non_empty() {
        let fields = vec![ApiField::to_many("tags", "tag").required(true)];
        let mut bundle = Bundle::default();
        bundle.document.insert("tags".to_string(), json!([]));

        let mut errors = ValidationErrors::new();
        check_required_fields(&fields, &bundle, &mut errors);
        assert!(errors.contains_key("tags"));

        bundle
            .document
            .insert("tags".to_string(), json!(["some-id"]));
        let mut errors = ValidationErrors::new();
        check_required_fields(&fields, &bundle, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_custom_validator_seam() {
        struct EvenAge;
        impl Validator for EvenAge {
            fn validate(&self, bundle: &Bundle, errors: &mut ValidationErrors) {
                if let Some(age) = bundle.document.get("age").and_then(Value::as_i64) {
                    if age % 2 != 0 {
                        errors
                            .entry("age".to_string())
                            .or_default()
                            .push("age must be even".to_string());
                    }
                }
            }
        }

        let mut bundle = Bundle::default();
        bundle.document.insert("age".to_string(), json!(3));
        let mut errors = ValidationErrors::new();
        EvenAge.validate(&bundle, &mut errors);
        assert_eq!(errors["age"], vec!["age must be even".to_string()]);
    }
}
