//! API field system
//!
//! Fields describe how document attributes surface on a resource: the wire
//! type, coercion rules, defaults, and whether the field references other
//! resources. The same type doubles as the entry of a `DocumentSchema`, the
//! storage-side description a resource derives its fields from.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};

use crate::bundle::Bundle;
use crate::errors::ApiError;
use crate::store::DocumentId;

/// Wire type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Id,
    String,
    Integer,
    Float,
    Boolean,
    List,
    Object,
    Date,
    DateTime,
    Time,
    /// Nested document validated against its own field list
    Embedded(Arc<Vec<ApiField>>),
    /// Reference to a single document of another resource
    ToOne,
    /// References to many documents of another resource
    ToMany,
}

impl FieldType {
    #[must_use]
    pub const fn is_related(&self) -> bool {
        matches!(self, Self::ToOne | Self::ToMany)
    }

    #[must_use]
    pub const fn is_to_many(&self) -> bool {
        matches!(self, Self::ToMany)
    }

    /// Type name shown by the schema endpoint
    #[must_use]
    pub const fn schema_type(&self) -> &'static str {
        match self {
            Self::Id | Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Object | Self::Embedded(_) => "dict",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::ToOne | Self::ToMany => "related",
        }
    }

    const fn default_help(&self) -> &'static str {
        match self {
            Self::Id => "Document identifier. Ex: \"067d6b0e-5a3a-4a6b-9a3b-4c1f6b9a2d10\"",
            Self::String => "String data. Ex: \"Hello World\"",
            Self::Integer => "Integer data. Ex: 2673",
            Self::Float => "Floating point numeric data. Ex: 26.73",
            Self::Boolean => "Boolean data. Ex: true",
            Self::List => "A list of data. Ex: [\"abc\", 26.73]",
            Self::Object => "An object of data. Ex: {\"price\": 26.73}",
            Self::Date => "A date as a string. Ex: \"2010-11-10\"",
            Self::DateTime => "A date & time as a string. Ex: \"2010-11-10T03:07:43\"",
            Self::Time => "A time as a string. Ex: \"03:02:14\"",
            Self::Embedded(_) => "A nested document. Ex: {\"street\": \"Main St 1\"}",
            Self::ToOne => "A single related resource. Either a URI or nested resource data.",
            Self::ToMany => {
                "Many related resources. A list of URIs and/or nested resource data."
            }
        }
    }
}

/// One field exposed on a resource (or declared on a document schema)
#[derive(Debug, Clone, PartialEq)]
pub struct ApiField {
    pub name: String,
    attribute: Option<String>,
    pub field_type: FieldType,
    pub default: Option<Value>,
    pub required: bool,
    pub readonly: bool,
    pub unique: bool,
    help_text: Option<String>,
    /// Related fields only: embed full documents instead of URIs
    pub full: bool,
    /// Related fields only: name of the target resource; `"self"` allowed
    pub related_to: Option<String>,
}

impl ApiField {
    #[must_use]
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            attribute: None,
            field_type,
            default: None,
            required: false,
            readonly: false,
            unique: false,
            help_text: None,
            full: false,
            related_to: None,
        }
    }

    /// The canonical `id` field every document carries
    #[must_use]
    pub fn id() -> Self {
        let mut field = Self::new("id", FieldType::Id);
        field.readonly = true;
        field.unique = true;
        field
    }

    #[must_use]
    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::String)
    }

    #[must_use]
    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    #[must_use]
    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    #[must_use]
    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    #[must_use]
    pub fn list(name: &str) -> Self {
        Self::new(name, FieldType::List)
    }

    #[must_use]
    pub fn object(name: &str) -> Self {
        Self::new(name, FieldType::Object)
    }

    #[must_use]
    pub fn date(name: &str) -> Self {
        Self::new(name, FieldType::Date)
    }

    #[must_use]
    pub fn datetime(name: &str) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    #[must_use]
    pub fn time(name: &str) -> Self {
        Self::new(name, FieldType::Time)
    }

    #[must_use]
    pub fn embedded(name: &str, schema: Vec<Self>) -> Self {
        Self::new(name, FieldType::Embedded(Arc::new(schema)))
    }

    #[must_use]
    pub fn to_one(name: &str, resource: &str) -> Self {
        let mut field = Self::new(name, FieldType::ToOne);
        field.related_to = Some(resource.to_string());
        field
    }

    #[must_use]
    pub fn to_many(name: &str, resource: &str) -> Self {
        let mut field = Self::new(name, FieldType::ToMany);
        field.related_to = Some(resource.to_string());
        field
    }

    // Builder-style modifiers, chained at resource construction time.

    #[must_use]
    pub fn attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub const fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    #[must_use]
    pub const fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn help(mut self, help_text: &str) -> Self {
        self.help_text = Some(help_text.to_string());
        self
    }

    #[must_use]
    pub const fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Document key the field reads and writes; defaults to the field name
    #[must_use]
    pub fn attribute_name(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn help_text(&self) -> &str {
        self.help_text
            .as_deref()
            .unwrap_or_else(|| self.field_type.default_help())
    }

    #[must_use]
    pub const fn is_related(&self) -> bool {
        self.field_type.is_related()
    }

    #[must_use]
    pub const fn is_to_many(&self) -> bool {
        self.field_type.is_to_many()
    }

    /// Coerce a JSON value to the field's canonical form
    ///
    /// Null always passes through; related values are left untouched (the
    /// resource resolves them against the registry).
    pub fn convert(&self, value: &Value) -> Result<Value, ApiError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match &self.field_type {
            FieldType::Id => match value.as_str().and_then(DocumentId::from_uri_or_id) {
                Some(id) => Ok(Value::String(id.to_string())),
                None => Err(self.bad_value(value, "a document id")),
            },
            FieldType::String => match value {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(self.bad_value(value, "a string")),
            },
            FieldType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                    .map(Value::from)
                    .ok_or_else(|| self.bad_value(value, "an integer")),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| self.bad_value(value, "an integer")),
                _ => Err(self.bad_value(value, "an integer")),
            },
            FieldType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(Value::from)
                    .ok_or_else(|| self.bad_value(value, "a float")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| self.bad_value(value, "a float")),
                _ => Err(self.bad_value(value, "a float")),
            },
            FieldType::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => parse_bool_token(s)
                    .map(Value::Bool)
                    .ok_or_else(|| self.bad_value(value, "a boolean")),
                _ => Err(self.bad_value(value, "a boolean")),
            },
            FieldType::List => match value {
                Value::Array(items) => Ok(Value::Array(items.clone())),
                _ => Err(self.bad_value(value, "a list")),
            },
            FieldType::Object => match value {
                Value::Object(map) => Ok(Value::Object(map.clone())),
                _ => Err(self.bad_value(value, "an object")),
            },
            FieldType::Date => match value.as_str().and_then(parse_date) {
                Some(date) => Ok(Value::String(date.format("%Y-%m-%d").to_string())),
                None => Err(self.bad_value(value, "a date string")),
            },
            FieldType::DateTime => match value.as_str().and_then(parse_datetime) {
                Some(dt) => Ok(Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
                None => Err(self.bad_value(value, "a datetime string")),
            },
            FieldType::Time => match value.as_str().and_then(parse_time) {
                Some(time) => Ok(Value::String(time.format("%H:%M:%S%.f").to_string())),
                None => Err(self.bad_value(value, "a time string")),
            },
            FieldType::Embedded(schema) => match value {
                Value::Object(map) => self.convert_embedded(schema, map),
                _ => Err(self.bad_value(value, "a nested document")),
            },
            FieldType::ToOne | FieldType::ToMany => Ok(value.clone()),
        }
    }

    fn convert_embedded(
        &self,
        schema: &[Self],
        map: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let mut converted = map.clone();
        for subfield in schema {
            match map.get(&subfield.name) {
                Some(value) => {
                    converted.insert(subfield.name.clone(), subfield.convert(value)?);
                }
                None if subfield.required && subfield.default.is_none() => {
                    return Err(ApiError::field(
                        format!("{}.{}", self.name, subfield.name),
                        "this field is required",
                    ));
                }
                None => {
                    if let Some(default) = &subfield.default {
                        converted.insert(subfield.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(Value::Object(converted))
    }

    /// Value for the document attribute from incoming bundle data
    ///
    /// `None` means "leave the attribute as it is". Missing required data is
    /// left for validation to report, so clients see all problems at once.
    pub fn hydrate(&self, bundle: &Bundle) -> Result<Option<Value>, ApiError> {
        if let Some(value) = bundle.data.get(&self.name) {
            return Ok(Some(self.convert(value)?));
        }
        if bundle.document.contains_key(self.attribute_name()) {
            return Ok(None);
        }
        if let Some(default) = &self.default {
            return Ok(Some(default.clone()));
        }
        if self.required {
            return Ok(None);
        }
        Ok(Some(Value::Null))
    }

    /// Value for the representation from the bundle's document
    pub fn dehydrate(&self, bundle: &Bundle) -> Result<Value, ApiError> {
        match bundle.document.get(self.attribute_name()) {
            Some(value) if !value.is_null() => self.convert(value),
            _ => {
                if let Some(default) = &self.default {
                    Ok(default.clone())
                } else if self.required {
                    Err(ApiError::field(
                        &self.name,
                        format!(
                            "the document has no `{}` attribute and the field allows no default or null",
                            self.attribute_name()
                        ),
                    ))
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    fn bad_value(&self, value: &Value, expected: &str) -> ApiError {
        ApiError::field(
            &self.name,
            format!("`{value}` doesn't appear to be {expected}"),
        )
    }
}

/// Storage-side description of a collection's documents
///
/// Resources derive their api fields from this; filters may also consult it
/// for fields that are filterable but not exposed.
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    pub collection: String,
    pub fields: Vec<ApiField>,
}

impl DocumentSchema {
    #[must_use]
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            fields: vec![ApiField::id()],
        }
    }

    /// Add a field to the schema
    #[must_use]
    pub fn field(mut self, field: ApiField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ApiField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Boolean tokens accepted in data and filter values
#[must_use]
pub fn parse_bool_token(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "t" | "1" => Some(true),
        "false" | "False" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a date, also accepting a full datetime and keeping its date part
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(raw).map(|dt| dt.date()))
}

/// Parse a datetime; timezone-aware inputs are normalized to naive UTC
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Parse a time of day
#[must_use]
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(raw, "%H:%M").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_scalars() {
        assert_eq!(
            ApiField::string("s").convert(&json!(26)).unwrap(),
            json!("26")
        );
        assert_eq!(
            ApiField::integer("i").convert(&json!("42")).unwrap(),
            json!(42)
        );
        assert_eq!(
            ApiField::integer("i").convert(&json!(4.7)).unwrap(),
            json!(4)
        );
        assert_eq!(
            ApiField::float("f").convert(&json!("26.73")).unwrap(),
            json!(26.73)
        );
        assert_eq!(
            ApiField::boolean("b").convert(&json!("t")).unwrap(),
            json!(true)
        );
        assert_eq!(
            ApiField::string("s").convert(&Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_convert_rejects_wrong_shapes() {
        assert!(ApiField::integer("i").convert(&json!("nope")).is_err());
        assert!(ApiField::list("l").convert(&json!({"a": 1})).is_err());
        assert!(ApiField::object("o").convert(&json!([1, 2])).is_err());
        assert!(ApiField::boolean("b").convert(&json!("yes")).is_err());
    }

    #[test]
    fn test_convert_datetime_normalizes_to_naive_utc() {
        let field = ApiField::datetime("added");
        assert_eq!(
            field.convert(&json!("2011-12-01T15:30:00+02:00")).unwrap(),
            json!("2011-12-01T13:30:00")
        );
        assert_eq!(
            field.convert(&json!("2011-12-01 15:30:00")).unwrap(),
            json!("2011-12-01T15:30:00")
        );
        // A bare date becomes midnight
        assert_eq!(
            field.convert(&json!("2011-12-01")).unwrap(),
            json!("2011-12-01T00:00:00")
        );
    }

    #[test]
    fn test_convert_date_and_time() {
        assert_eq!(
            ApiField::date("d")
                .convert(&json!("2010-11-10T03:07:43"))
                .unwrap(),
            json!("2010-11-10")
        );
        assert_eq!(
            ApiField::time("t").convert(&json!("03:02")).unwrap(),
            json!("03:02:00")
        );
        assert!(ApiField::date("d").convert(&json!("tomorrow")).is_err());
    }

    #[test]
    fn test_convert_id_accepts_uri() {
        let id = DocumentId::new();
        let field = ApiField::id();
        let uri = format!("/api/v1/note/{id}/");
        assert_eq!(field.convert(&json!(uri)).unwrap(), json!(id.to_string()));
        assert!(field.convert(&json!("not-an-id")).is_err());
    }

    #[test]
    fn test_convert_embedded_applies_subfields() {
        let field = ApiField::embedded(
            "address",
            vec![
                ApiField::string("street").required(true),
                ApiField::integer("number"),
            ],
        );
        let converted = field
            .convert(&json!({"street": "Main", "number": "7", "extra": true}))
            .unwrap();
        assert_eq!(converted, json!({"street": "Main", "number": 7, "extra": true}));

        let err = field.convert(&json!({"number": 7})).unwrap_err();
        assert!(err.to_string().contains("address.street"));
    }

    #[test]
    fn test_hydrate_precedence() {
        let field = ApiField::string("name").default_value(json!("anonymous"));

        // Data wins
        let mut bundle = Bundle::default();
        bundle.data.insert("name".to_string(), json!("given"));
        assert_eq!(field.hydrate(&bundle).unwrap(), Some(json!("given")));

        // Existing attribute is left alone
        let mut bundle = Bundle::default();
        bundle.document.insert("name".to_string(), json!("kept"));
        assert_eq!(field.hydrate(&bundle).unwrap(), None);

        // Default fills the gap
        let bundle = Bundle::default();
        assert_eq!(field.hydrate(&bundle).unwrap(), Some(json!("anonymous")));

        // Optional without default becomes null
        let field = ApiField::string("name");
        assert_eq!(field.hydrate(&bundle).unwrap(), Some(Value::Null));

        // Required without data is deferred to validation
        let field = ApiField::string("name").required(true);
        assert_eq!(field.hydrate(&bundle).unwrap(), None);
    }

    #[test]
    fn test_dehydrate_uses_default_and_null() {
        let mut bundle = Bundle::default();
        bundle.document.insert("count".to_string(), json!("12"));

        assert_eq!(
            ApiField::integer("count").dehydrate(&bundle).unwrap(),
            json!(12)
        );
        assert_eq!(
            ApiField::integer("missing")
                .default_value(json!(0))
                .dehydrate(&bundle)
                .unwrap(),
            json!(0)
        );
        assert_eq!(
            ApiField::integer("missing").dehydrate(&bundle).unwrap(),
            Value::Null
        );
        assert!(ApiField::integer("missing")
            .required(true)
            .dehydrate(&bundle)
            .is_err());
    }

    #[test]
    fn test_attribute_redirects_lookup() {
        let field = ApiField::string("title").attribute("name");
        let mut bundle = Bundle::default();
        bundle.document.insert("name".to_string(), json!("doc"));
        assert_eq!(field.dehydrate(&bundle).unwrap(), json!("doc"));
    }

    #[test]
    fn test_schema_lookup() {
        let schema = DocumentSchema::new("note")
            .field(ApiField::string("title"))
            .field(ApiField::to_one("author", "person"));
        assert!(schema.get("id").is_some());
        assert!(schema.get("title").is_some());
        assert!(schema.get("author").unwrap().is_related());
        assert!(schema.get("nope").is_none());
    }
}
