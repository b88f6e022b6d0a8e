//! Bundle module
//!
//! A `Bundle` is a small container pairing a document with the request data
//! it is being built from, used throughout the hydrate/dehydrate cycle. Write
//! flows create one bundle per incoming object (plus nested bundles for
//! related data) and thread it through hydration, validation and save.

use serde_json::{Map, Value};

use crate::store::{document_id, Document, DocumentId};

/// Document + request-scoped data travelling through a hydrate/dehydrate pass
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// The document being read or written
    pub document: Document,
    /// Incoming data this bundle was built from (empty on reads)
    pub data: Map<String, Value>,
    /// The data only referenced an existing document; never update it
    pub uri_only: bool,
    /// The document was created for this request (as opposed to loaded)
    pub created: bool,
    /// Bundles built from nested related data, saved children-first
    pub nested: Vec<NestedBundles>,
}

/// Related bundles hanging off one field of a parent bundle
#[derive(Debug, Clone)]
pub struct NestedBundles {
    /// Field on the parent resource these belong to
    pub field_name: String,
    /// Name of the related resource that owns the bundles
    pub resource: String,
    pub bundles: Vec<Bundle>,
}

impl Bundle {
    /// Bundle up an existing document for dehydration
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    /// Bundle up incoming data against a document (loaded or freshly created)
    #[must_use]
    pub fn new(document: Document, data: Map<String, Value>) -> Self {
        Self {
            document,
            data,
            ..Self::default()
        }
    }

    /// Id of the underlying document, when it has one
    #[must_use]
    pub fn id(&self) -> Option<DocumentId> {
        document_id(&self.document)
    }

    /// Set an attribute on the underlying document
    pub fn set(&mut self, attribute: &str, value: Value) {
        self.document.insert(attribute.to_string(), value);
    }
}
