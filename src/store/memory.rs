//! In-memory document store
//!
//! Collections are BTree maps keyed by id, so unsorted reads come back in a
//! deterministic order. Intended for tests and demos, but fully functional.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{
    require_id, slice_page, sort_documents, Document, DocumentId, DocumentStore, Query,
    QueryResult, StoreError,
};

/// Process-local store backed by nested BTree maps
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<QueryResult, StoreError> {
        let mut matched: Vec<Document> = {
            let collections = self.collections.read().unwrap();
            match collections.get(collection) {
                Some(documents) => documents
                    .values()
                    .filter(|doc| query.filter.matches(doc))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        sort_documents(&mut matched, &query.sort);
        let total_count = matched.len();
        Ok(QueryResult {
            documents: slice_page(matched, query.offset, query.limit),
            total_count,
        })
    }

    async fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().unwrap();
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(&id.to_string()))
            .cloned())
    }

    async fn get_many(
        &self,
        collection: &str,
        ids: &[DocumentId],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().unwrap();
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| documents.get(&id.to_string()).cloned())
            .collect())
    }

    async fn save(&self, collection: &str, document: &Document) -> Result<(), StoreError> {
        let id = require_id(document)?;
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().unwrap();
        Ok(collections
            .get_mut(collection)
            .is_some_and(|documents| documents.remove(&id.to_string()).is_some()))
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read().unwrap();
        Ok(collections.get(collection).map_or(0, BTreeMap::len))
    }
}
