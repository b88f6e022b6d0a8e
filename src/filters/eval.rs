//! Filter evaluation against documents
//!
//! Matching follows document-database conventions: equality against an array
//! attribute also matches any element, null equals missing, and ordering
//! comparisons only apply within a type. Numbers compare numerically; strings
//! (including the canonical ISO date strings) compare lexicographically.

use serde_json::Value;

use super::{Condition, Filter, Operator};
use crate::store::Document;

impl Filter {
    /// Does `document` satisfy this filter?
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|filter| filter.matches(document)),
            // An empty OR group is never built; treat it as neutral
            Self::Or(filters) => {
                filters.is_empty() || filters.iter().any(|filter| filter.matches(document))
            }
            Self::Condition(condition) => condition.matches(document),
        }
    }
}

impl Condition {
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        let attribute = document.get(&self.attribute);
        match self.operator {
            Operator::Exists => match self.value.as_bool() {
                Some(true) => attribute.is_some_and(|value| !value.is_null()),
                Some(false) => !attribute.is_some_and(|value| !value.is_null()),
                // An unparseable exists value matches nothing
                None => false,
            },
            Operator::Size => match (self.value.as_u64(), attribute) {
                (Some(size), Some(Value::Array(items))) => items.len() as u64 == size,
                (Some(size), Some(Value::Object(map))) => map.len() as u64 == size,
                _ => false,
            },
            Operator::Exact => equals(attribute, &self.value),
            Operator::Ne => !equals(attribute, &self.value),
            Operator::In => is_in(attribute, &self.value),
            Operator::Nin => !is_in(attribute, &self.value),
            Operator::All => match &self.value {
                Value::Array(wanted) => wanted
                    .iter()
                    .all(|want| candidates(attribute).any(|have| values_equal(have, want))),
                _ => false,
            },
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                candidates(attribute).any(|have| compares(have, &self.value, self.operator))
            }
            _ => {
                let Some(needle) = self.value.as_str() else {
                    return false;
                };
                string_candidates(attribute).any(|have| match_op(have, needle, self.operator))
            }
        }
    }
}

/// Equality with document-db semantics
fn equals(attribute: Option<&Value>, value: &Value) -> bool {
    match attribute {
        None => value.is_null(),
        Some(Value::Null) => value.is_null(),
        Some(have) => {
            if values_equal(have, value) {
                return true;
            }
            // Array attributes also match on any element
            match have {
                Value::Array(items) if !value.is_array() => {
                    items.iter().any(|item| values_equal(item, value))
                }
                _ => false,
            }
        }
    }
}

fn is_in(attribute: Option<&Value>, value: &Value) -> bool {
    let Value::Array(allowed) = value else {
        return false;
    };
    candidates(attribute)
        .any(|have| allowed.iter().any(|want| values_equal(have, want)))
}

/// Values an attribute offers for element-wise comparison
fn candidates(attribute: Option<&Value>) -> impl Iterator<Item = &Value> {
    let slice: &[Value] = match attribute {
        Some(Value::Array(items)) => items.as_slice(),
        Some(other) => std::slice::from_ref(other),
        None => &[],
    };
    slice.iter()
}

fn string_candidates(attribute: Option<&Value>) -> impl Iterator<Item = &str> {
    candidates(attribute).filter_map(Value::as_str)
}

/// Equality across the i64/u64/f64 number representations
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        return match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => x == y,
        };
    }
    a == b
}

fn compares(have: &Value, want: &Value, operator: Operator) -> bool {
    let ordering = match (have, want) {
        (Value::Number(have), Value::Number(want)) => {
            match (have.as_f64(), want.as_f64()) {
                (Some(have), Some(want)) => have.partial_cmp(&want),
                _ => None,
            }
        }
        (Value::String(have), Value::String(want)) => Some(have.as_str().cmp(want.as_str())),
        _ => None,
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match operator {
        Operator::Gt => ordering.is_gt(),
        Operator::Gte => ordering.is_ge(),
        Operator::Lt => ordering.is_lt(),
        Operator::Lte => ordering.is_le(),
        _ => false,
    }
}

fn match_op(have: &str, needle: &str, operator: Operator) -> bool {
    match operator {
        Operator::Contains => have.contains(needle),
        Operator::IContains => have.to_lowercase().contains(&needle.to_lowercase()),
        Operator::StartsWith => have.starts_with(needle),
        Operator::IStartsWith => have.to_lowercase().starts_with(&needle.to_lowercase()),
        Operator::EndsWith => have.ends_with(needle),
        Operator::IEndsWith => have.to_lowercase().ends_with(&needle.to_lowercase()),
        Operator::IExact => have.to_lowercase() == needle.to_lowercase(),
        _ => false,
    }
}
