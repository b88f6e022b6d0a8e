//! Per-resource configuration
//!
//! Everything a resource can tune sits in one options struct with sensible
//! defaults: allowed methods (overall and split per list/detail), paging
//! bounds, the default wire format, filtering/ordering allow-lists, and the
//! write-response switches.

use std::collections::BTreeMap;

use hyper::Method;

use crate::filters::Operator;

/// How far filtering may go on one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Any operator the field type admits
    All,
    /// Like `All`, plus lookups that traverse into the related resource
    AllWithRelations,
    /// Only the listed operators
    Operators(Vec<Operator>),
}

impl FilterSpec {
    /// Does this spec admit the operator (type rules aside)?
    #[must_use]
    pub fn allows(&self, operator: Operator) -> bool {
        match self {
            Self::All | Self::AllWithRelations => true,
            Self::Operators(allowed) => allowed.contains(&operator),
        }
    }

    /// May lookups traverse through this field?
    #[must_use]
    pub const fn allows_relations(&self) -> bool {
        matches!(self, Self::AllWithRelations)
    }

    /// How the spec reads in the schema document
    #[must_use]
    pub fn schema_value(&self) -> serde_json::Value {
        match self {
            Self::All => serde_json::Value::String("ALL".to_string()),
            Self::AllWithRelations => serde_json::Value::String("ALL_WITH_RELATIONS".to_string()),
            Self::Operators(operators) => serde_json::Value::Array(
                operators
                    .iter()
                    .map(|operator| serde_json::Value::String(operator.as_str().to_string()))
                    .collect(),
            ),
        }
    }
}

/// Tunables of a `DocumentResource`
#[derive(Debug, Clone)]
pub struct ResourceOptions {
    /// Methods allowed unless overridden per request kind
    pub allowed_methods: Vec<Method>,
    pub list_allowed_methods: Option<Vec<Method>>,
    pub detail_allowed_methods: Option<Vec<Method>>,
    /// Default page size
    pub limit: usize,
    /// Hard page-size ceiling; also what `limit=0` resolves to
    pub max_limit: usize,
    pub default_format: String,
    /// Field name -> how it may be filtered; absent means not filterable
    pub filtering: BTreeMap<String, FilterSpec>,
    /// Fields `order_by` may name
    pub ordering: Vec<String>,
    /// Expose the computed `resource_uri` field
    pub include_resource_uri: bool,
    pub return_data_on_post: bool,
    pub return_data_on_put: bool,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            allowed_methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
            list_allowed_methods: None,
            detail_allowed_methods: None,
            limit: 20,
            max_limit: 1000,
            default_format: "application/json".to_string(),
            filtering: BTreeMap::new(),
            ordering: Vec::new(),
            include_resource_uri: true,
            return_data_on_post: true,
            return_data_on_put: true,
        }
    }
}

impl ResourceOptions {
    /// Methods effective for list requests
    #[must_use]
    pub fn list_methods(&self) -> &[Method] {
        self.list_allowed_methods
            .as_deref()
            .unwrap_or(&self.allowed_methods)
    }

    /// Methods effective for detail requests
    #[must_use]
    pub fn detail_methods(&self) -> &[Method] {
        self.detail_allowed_methods
            .as_deref()
            .unwrap_or(&self.allowed_methods)
    }

    /// The `Allow` header value for a method list
    #[must_use]
    pub fn allow_header(methods: &[Method]) -> String {
        let mut names: Vec<&str> = methods.iter().map(Method::as_str).collect();
        if !names.contains(&"OPTIONS") {
            names.push("OPTIONS");
        }
        names.join(",")
    }
}
