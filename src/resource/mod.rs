//! Resource module
//!
//! A `DocumentResource` exposes one document collection over REST: it owns
//! the api fields derived from the collection's schema, the per-resource
//! options, and the plugin seams (store, auth, throttle, validation,
//! serialization). Dispatch, CRUD handlers and query building live in the
//! submodules.

mod crud;
mod dispatch;
mod options;
mod query;

pub use options::{FilterSpec, ResourceOptions};

use std::sync::Arc;

use crate::api::Api;
use crate::auth::{Authentication, Authorization, NoAuthentication, OpenAuthorization};
use crate::errors::ApiError;
use crate::fields::{ApiField, DocumentSchema, FieldType};
use crate::serializer::Serializer;
use crate::store::DocumentStore;
use crate::throttle::{NoThrottle, Throttle};
use crate::validation::{NoValidation, Validator};

/// Whether a request addresses the collection or a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    List,
    Detail,
}

/// One document collection exposed over REST
pub struct DocumentResource {
    name: String,
    schema: DocumentSchema,
    fields: Vec<ApiField>,
    options: ResourceOptions,
    store: Arc<dyn DocumentStore>,
    serializer: Serializer,
    authentication: Arc<dyn Authentication>,
    authorization: Arc<dyn Authorization>,
    throttle: Arc<dyn Throttle>,
    validator: Arc<dyn Validator>,
}

impl DocumentResource {
    /// Start building a resource over `schema`, stored in `store`
    #[must_use]
    pub fn build(name: &str, schema: DocumentSchema, store: Arc<dyn DocumentStore>) -> ResourceBuilder {
        ResourceBuilder::new(name, schema, store)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.schema.collection
    }

    #[must_use]
    pub fn fields(&self) -> &[ApiField] {
        &self.fields
    }

    #[must_use]
    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    /// Field exposed on the resource
    pub(crate) fn field(&self, name: &str) -> Option<&ApiField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Field exposed on the resource, falling back to the document schema
    ///
    /// The fallback is what lets `filtering` allow fields the resource does
    /// not expose.
    pub(crate) fn field_or_schema(&self, name: &str) -> Option<&ApiField> {
        self.field(name).or_else(|| self.schema.get(name))
    }

    /// URI of the collection endpoint
    #[must_use]
    pub fn list_uri(&self, api: &Api) -> String {
        format!("{}/{}/", api.base_path(), self.name)
    }

    /// URI of one document's endpoint
    #[must_use]
    pub fn detail_uri(&self, api: &Api, id: &str) -> String {
        format!("{}/{}/{}/", api.base_path(), self.name, id)
    }

    /// Resolve the resource a related field points at; `"self"` loops back
    pub(crate) fn related_resource<'a>(
        &self,
        api: &'a Api,
        field: &ApiField,
    ) -> Result<&'a Arc<Self>, ApiError> {
        let target = field.related_to.as_deref().ok_or_else(|| {
            ApiError::Configuration(format!(
                "related field `{}` names no target resource",
                field.name
            ))
        })?;
        let name = if target == "self" { &self.name } else { target };
        api.resource(name)
    }
}

/// Step-by-step construction of a `DocumentResource`
pub struct ResourceBuilder {
    name: String,
    schema: DocumentSchema,
    store: Arc<dyn DocumentStore>,
    explicit_fields: Vec<ApiField>,
    allow_fields: Option<Vec<String>>,
    exclude_fields: Vec<String>,
    filter_shorthand: Vec<String>,
    options: ResourceOptions,
    serializer: Serializer,
    authentication: Arc<dyn Authentication>,
    authorization: Arc<dyn Authorization>,
    throttle: Arc<dyn Throttle>,
    validator: Arc<dyn Validator>,
}

impl ResourceBuilder {
    fn new(name: &str, schema: DocumentSchema, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: name.to_string(),
            schema,
            store,
            explicit_fields: Vec::new(),
            allow_fields: None,
            exclude_fields: Vec::new(),
            filter_shorthand: Vec::new(),
            options: ResourceOptions::default(),
            serializer: Serializer::default(),
            authentication: Arc::new(NoAuthentication),
            authorization: Arc::new(OpenAuthorization),
            throttle: Arc::new(NoThrottle),
            validator: Arc::new(NoValidation),
        }
    }

    /// Declare or override a field explicitly
    ///
    /// Related schema entries stay off the resource unless declared here.
    #[must_use]
    pub fn field(mut self, field: ApiField) -> Self {
        self.explicit_fields.push(field);
        self
    }

    /// Keep only the named fields (`resource_uri` is managed separately)
    #[must_use]
    pub fn fields(mut self, names: &[&str]) -> Self {
        self.allow_fields = Some(names.iter().map(|name| (*name).to_string()).collect());
        self
    }

    /// Drop the named fields
    #[must_use]
    pub fn exclude(mut self, names: &[&str]) -> Self {
        self.exclude_fields
            .extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    /// Replace the whole options block
    #[must_use]
    pub fn options(mut self, options: ResourceOptions) -> Self {
        self.options = options;
        self
    }

    /// Allow filtering on one field
    #[must_use]
    pub fn filtering(mut self, field: &str, spec: FilterSpec) -> Self {
        self.options.filtering.insert(field.to_string(), spec);
        self
    }

    /// Allow every admissible lookup on the named fields
    ///
    /// Shorthand for `FilterSpec::All` per field; fields that resolve to a
    /// related kind get `FilterSpec::AllWithRelations` instead.
    #[must_use]
    pub fn filter_fields(mut self, names: &[&str]) -> Self {
        self.filter_shorthand
            .extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    /// Allow ordering on the named fields
    #[must_use]
    pub fn ordering(mut self, names: &[&str]) -> Self {
        self.options
            .ordering
            .extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    #[must_use]
    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    #[must_use]
    pub fn authentication(mut self, authentication: impl Authentication + 'static) -> Self {
        self.authentication = Arc::new(authentication);
        self
    }

    #[must_use]
    pub fn authorization(mut self, authorization: impl Authorization + 'static) -> Self {
        self.authorization = Arc::new(authorization);
        self
    }

    #[must_use]
    pub fn throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Arc::new(throttle);
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Derive the field list and assemble the resource
    pub fn finish(mut self) -> Result<DocumentResource, ApiError> {
        let mut fields: Vec<ApiField> = self
            .schema
            .fields
            .iter()
            .filter(|field| !field.is_related())
            .cloned()
            .collect();

        for explicit in self.explicit_fields {
            if explicit.is_related() && explicit.related_to.is_none() {
                return Err(ApiError::Configuration(format!(
                    "related field `{}` names no target resource",
                    explicit.name
                )));
            }
            match fields.iter_mut().find(|field| field.name == explicit.name) {
                Some(slot) => *slot = explicit,
                None => fields.push(explicit),
            }
        }

        if let Some(allow) = &self.allow_fields {
            fields.retain(|field| allow.contains(&field.name));
        }
        if !self.exclude_fields.is_empty() {
            fields.retain(|field| !self.exclude_fields.contains(&field.name));
        }

        if self.options.include_resource_uri
            && !fields.iter().any(|field| field.name == "resource_uri")
        {
            fields.push(
                ApiField::new("resource_uri", FieldType::String)
                    .readonly(true)
                    .help("The canonical URI of this document."),
            );
        }

        for name in &self.filter_shorthand {
            let related = fields
                .iter()
                .find(|field| field.name == *name)
                .map(ApiField::is_related)
                .or_else(|| self.schema.get(name).map(ApiField::is_related));
            let spec = match related {
                Some(true) => FilterSpec::AllWithRelations,
                Some(false) => FilterSpec::All,
                None => {
                    return Err(ApiError::Configuration(format!(
                        "filtering names unknown field `{name}`"
                    )))
                }
            };
            self.options.filtering.entry(name.clone()).or_insert(spec);
        }

        // Catch filtering/ordering typos at build time instead of request time
        for name in self.options.filtering.keys() {
            let known = fields.iter().any(|field| field.name == *name)
                || self.schema.get(name).is_some();
            if !known {
                return Err(ApiError::Configuration(format!(
                    "filtering names unknown field `{name}`"
                )));
            }
        }
        for name in &self.options.ordering {
            if !fields.iter().any(|field| field.name == *name) {
                return Err(ApiError::Configuration(format!(
                    "ordering names unknown field `{name}`"
                )));
            }
        }

        Ok(DocumentResource {
            name: self.name,
            schema: self.schema,
            fields,
            options: self.options,
            store: self.store,
            serializer: self.serializer,
            authentication: self.authentication,
            authorization: self.authorization,
            throttle: self.throttle,
            validator: self.validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Operator;
    use crate::store::MemoryStore;

    fn schema() -> DocumentSchema {
        DocumentSchema::new("note")
            .field(ApiField::string("title").required(true))
            .field(ApiField::integer("views"))
            .field(ApiField::to_one("author", "person"))
    }

    #[test]
    fn test_related_schema_fields_are_opt_in() {
        let resource = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .finish()
            .unwrap();
        assert!(resource.field("title").is_some());
        assert!(resource.field("author").is_none());
        // Still reachable for filtering purposes
        assert!(resource.field_or_schema("author").is_some());
        // resource_uri is added by default
        assert!(resource.field("resource_uri").is_some());
    }

    #[test]
    fn test_explicit_fields_override_and_extend() {
        let resource = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .field(ApiField::to_one("author", "person").full(true))
            .field(ApiField::string("title").readonly(true))
            .finish()
            .unwrap();
        assert!(resource.field("author").unwrap().full);
        assert!(resource.field("title").unwrap().readonly);
    }

    #[test]
    fn test_allow_and_exclude_lists() {
        let resource = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .fields(&["id", "title"])
            .finish()
            .unwrap();
        assert!(resource.field("views").is_none());
        assert!(resource.field("title").is_some());

        let resource = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .exclude(&["views"])
            .finish()
            .unwrap();
        assert!(resource.field("views").is_none());
        assert!(resource.field("id").is_some());
    }

    #[test]
    fn test_filter_fields_shorthand() {
        let resource = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .field(ApiField::to_one("author", "person"))
            .filter_fields(&["title", "author"])
            .finish()
            .unwrap();
        assert_eq!(resource.options.filtering["title"], FilterSpec::All);
        assert_eq!(
            resource.options.filtering["author"],
            FilterSpec::AllWithRelations
        );

        // The long form is not overridden by the shorthand
        let resource = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .filtering("title", FilterSpec::Operators(vec![Operator::Exact]))
            .filter_fields(&["title"])
            .finish()
            .unwrap();
        assert!(matches!(
            resource.options.filtering["title"],
            FilterSpec::Operators(_)
        ));

        let result = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .filter_fields(&["missing"])
            .finish();
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }

    #[test]
    fn test_config_typos_fail_at_build() {
        let result = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .filtering("no_such_field", FilterSpec::All)
            .finish();
        assert!(matches!(result, Err(ApiError::Configuration(_))));

        let result = DocumentResource::build("note", schema(), Arc::new(MemoryStore::new()))
            .ordering(&["missing"])
            .finish();
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }
}
