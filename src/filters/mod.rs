//! Query-string filtering module
//!
//! Filters arrive as `field[__related_field…][__operator]=value` pairs, with
//! `exact` implied and a leading `OR__` marking membership of the OR group.
//! Parsing produces a typed `Filter` tree that the shipped stores evaluate
//! per document; value coercion and admissibility rules live in `value`,
//! evaluation in `eval`.

mod eval;
mod value;

pub use value::parse_filter_value;

use serde_json::Value;

use crate::fields::FieldType;

/// Separator between field path segments and the operator
pub const LOOKUP_SEP: &str = "__";

/// Leading marker for conditions that join the OR group
pub const OR_PREFIX: &str = "OR";

/// Every filter operator understood on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exact,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IExact,
    Exists,
    Size,
}

impl Operator {
    /// Parse a wire token; `None` when the token is not an operator
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "exact" => Self::Exact,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "in" => Self::In,
            "nin" => Self::Nin,
            "all" => Self::All,
            "contains" => Self::Contains,
            "icontains" => Self::IContains,
            "startswith" => Self::StartsWith,
            "istartswith" => Self::IStartsWith,
            "endswith" => Self::EndsWith,
            "iendswith" => Self::IEndsWith,
            "iexact" => Self::IExact,
            "exists" => Self::Exists,
            "size" => Self::Size,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::All => "all",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
            Self::IExact => "iexact",
            Self::Exists => "exists",
            Self::Size => "size",
        }
    }

    /// exact/ne plus the ordering comparisons
    #[must_use]
    pub const fn is_equality(self) -> bool {
        matches!(
            self,
            Self::Exact | Self::Ne | Self::Gt | Self::Gte | Self::Lt | Self::Lte
        )
    }

    /// Operators whose value is a list
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::In | Self::Nin | Self::All)
    }

    /// Substring/prefix/suffix matching, string fields only
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(
            self,
            Self::Contains
                | Self::IContains
                | Self::StartsWith
                | Self::IStartsWith
                | Self::EndsWith
                | Self::IEndsWith
                | Self::IExact
        )
    }
}

/// Which operators a field type admits
#[must_use]
pub fn operator_allowed(field_type: &FieldType, operator: Operator) -> bool {
    if operator == Operator::Exists {
        return true;
    }
    match field_type {
        FieldType::String => {
            operator.is_equality() || operator.is_list() || operator.is_match()
        }
        FieldType::Id
        | FieldType::ToOne
        | FieldType::Integer
        | FieldType::Float
        | FieldType::Boolean
        | FieldType::Date
        | FieldType::DateTime
        | FieldType::Time => operator.is_equality() || operator.is_list(),
        FieldType::List | FieldType::Object | FieldType::Embedded(_) => {
            operator == Operator::Size
        }
        FieldType::ToMany => matches!(
            operator,
            Operator::Exact | Operator::Ne | Operator::In | Operator::Nin | Operator::All
                | Operator::Size
        ),
    }
}

/// A parsed query-string key, before field resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey {
    /// Condition belongs to the OR group
    pub or_group: bool,
    /// Field path; more than one segment means a relational lookup
    pub parts: Vec<String>,
    pub operator: Operator,
}

/// Split a query-string key into path segments and an operator
///
/// The trailing segment only counts as an operator when it parses as one, so
/// fields that happen to share a name with an operator keep working as
/// lookup segments.
#[must_use]
pub fn parse_filter_key(key: &str) -> FilterKey {
    let mut parts: Vec<String> = key.split(LOOKUP_SEP).map(str::to_string).collect();
    let or_group = parts.first().is_some_and(|first| first == OR_PREFIX);
    if or_group {
        parts.remove(0);
    }
    let operator = match parts.last().map(|last| Operator::parse(last)) {
        Some(Some(op)) if parts.len() > 1 => {
            parts.pop();
            op
        }
        _ => Operator::Exact,
    };
    FilterKey {
        or_group,
        parts,
        operator,
    }
}

/// One attribute condition, as evaluated against a document
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub value: Value,
}

/// Boolean combination of conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Condition(Condition),
}

impl Default for Filter {
    /// The empty filter, matching every document
    fn default() -> Self {
        Self::And(Vec::new())
    }
}

impl Filter {
    /// Convenience constructor for a single condition
    #[must_use]
    pub fn condition(attribute: &str, operator: Operator, value: Value) -> Self {
        Self::Condition(Condition {
            attribute: attribute.to_string(),
            operator,
            value,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(filters) | Self::Or(filters) => filters.is_empty(),
            Self::Condition(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_key_plain() {
        let key = parse_filter_key("name");
        assert_eq!(key.parts, vec!["name"]);
        assert_eq!(key.operator, Operator::Exact);
        assert!(!key.or_group);
    }

    #[test]
    fn test_parse_filter_key_with_operator() {
        let key = parse_filter_key("age__gte");
        assert_eq!(key.parts, vec!["age"]);
        assert_eq!(key.operator, Operator::Gte);
    }

    #[test]
    fn test_parse_filter_key_relational() {
        let key = parse_filter_key("author__name__icontains");
        assert_eq!(key.parts, vec!["author", "name"]);
        assert_eq!(key.operator, Operator::IContains);
    }

    #[test]
    fn test_parse_filter_key_or_group() {
        let key = parse_filter_key("OR__name__ne");
        assert!(key.or_group);
        assert_eq!(key.parts, vec!["name"]);
        assert_eq!(key.operator, Operator::Ne);
    }

    #[test]
    fn test_field_named_like_operator_stays_a_field() {
        // A bare "size" is a field lookup, not an operator
        let key = parse_filter_key("size");
        assert_eq!(key.parts, vec!["size"]);
        assert_eq!(key.operator, Operator::Exact);

        // But "size__size" filters the field "size" by length
        let key = parse_filter_key("size__size");
        assert_eq!(key.parts, vec!["size"]);
        assert_eq!(key.operator, Operator::Size);
    }

    #[test]
    fn test_operator_admissibility() {
        assert!(operator_allowed(&FieldType::String, Operator::IContains));
        assert!(!operator_allowed(&FieldType::Integer, Operator::IContains));
        assert!(operator_allowed(&FieldType::Integer, Operator::Lte));
        assert!(!operator_allowed(&FieldType::List, Operator::Exact));
        assert!(operator_allowed(&FieldType::List, Operator::Size));
        assert!(operator_allowed(&FieldType::List, Operator::Exists));
        assert!(operator_allowed(&FieldType::ToMany, Operator::All));
        assert!(!operator_allowed(&FieldType::ToMany, Operator::Gt));
        assert!(operator_allowed(&FieldType::Boolean, Operator::Exists));
        assert!(!operator_allowed(&FieldType::String, Operator::Size));
    }
}
