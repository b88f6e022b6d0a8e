//! SQLite-backed document store
//!
//! One table holds every collection; document bodies are JSON text. Filters
//! and sorting are evaluated in process after a collection scan, while id
//! lookups go through the primary key.

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{
    require_id, slice_page, sort_documents, Document, DocumentId, DocumentStore, Query,
    QueryResult, StoreError,
};

/// Durable store over a single SQLite database file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Throwaway database, handy in tests
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id ASC")?;
        let bodies = stmt
            .query_map([collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies.iter().map(|body| parse_document(body)).collect()
    }
}

fn parse_document(body: &str) -> Result<Document, StoreError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| StoreError::Corrupt(format!("stored body is not valid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Corrupt(
            "stored body is not a JSON object".to_string(),
        )),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<QueryResult, StoreError> {
        let mut matched: Vec<Document> = self
            .load_collection(collection)?
            .into_iter()
            .filter(|doc| query.filter.matches(doc))
            .collect();

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
        let body: Option<String> = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.to_string()],
                |row| row.get(0),
            )
            .optional()?
        };
        body.as_deref().map(parse_document).transpose()
    }

    async fn get_many(
        &self,
        collection: &str,
        ids: &[DocumentId],
    ) -> Result<Vec<Document>, StoreError> {
        let bodies: Vec<String> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt =
                conn.prepare("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")?;
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                let body: Option<String> = stmt
                    .query_row(params![collection, id.to_string()], |row| row.get(0))
                    .optional()?;
                if let Some(body) = body {
                    found.push(body);
                }
            }
            found
        };
        bodies.iter().map(|body| parse_document(body)).collect()
    }

    async fn save(&self, collection: &str, document: &Document) -> Result<(), StoreError> {
        let id = require_id(document)?;
        let body = serde_json::to_string(&Value::Object(document.clone()))
            .map_err(|e| StoreError::Corrupt(format!("unserializable document: {e}")))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id.to_string(), body],
        )?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id.to_string()],
        )?;
        Ok(removed > 0)
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &DocumentId, name: &str) -> Document {
        let mut document = Document::new();
        document.insert("id".to_string(), json!(id.to_string()));
        document.insert("name".to_string(), json!(name));
        document
    }

    #[tokio::test]
    async fn test_roundtrip_in_memory() {
        let store = SqliteStore::in_memory().unwrap();
        let id = DocumentId::new();
        store.save("note", &doc(&id, "hello")).await.unwrap();

        let loaded = store.get("note", &id).await.unwrap().unwrap();
        assert_eq!(loaded["name"], json!("hello"));
        assert_eq!(store.count("note").await.unwrap(), 1);

        assert!(store.delete("note", &id).await.unwrap());
        assert!(!store.delete("note", &id).await.unwrap());
        assert_eq!(store.count("note").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = SqliteStore::in_memory().unwrap();
        let id = DocumentId::new();
        store.save("note", &doc(&id, "note")).await.unwrap();
        store
            .save("person", &doc(&DocumentId::new(), "someone"))
            .await
            .unwrap();

        assert_eq!(store.count("note").await.unwrap(), 1);
        assert_eq!(store.count("person").await.unwrap(), 1);
        assert!(store.get("person", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.db");
        let path = path.to_str().unwrap();
        let id = DocumentId::new();

        {
            let store = SqliteStore::open(path).unwrap();
            store.save("note", &doc(&id, "durable")).await.unwrap();
        }

        let store = SqliteStore::open(path).unwrap();
        let loaded = store.get("note", &id).await.unwrap().unwrap();
        assert_eq!(loaded["name"], json!("durable"));
    }

    #[tokio::test]
    async fn test_find_filters_in_process() {
        use crate::filters::{Condition, Filter, Operator};

        let store = SqliteStore::in_memory().unwrap();
        for name in ["apple", "banana"] {
            store
                .save("note", &doc(&DocumentId::new(), name))
                .await
                .unwrap();
        }

        let query = Query {
            filter: Filter::Condition(Condition {
                attribute: "name".to_string(),
                operator: Operator::Exact,
                value: json!("banana"),
            }),
            ..Query::default()
        };
        let result = store.find("note", &query).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.documents[0]["name"], json!("banana"));
    }
}
