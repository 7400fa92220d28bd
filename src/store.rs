//! Document store contract.
//!
//! Leads, dedupe entries and content singletons live in named collections of
//! JSON documents keyed by string ids. `PgDocumentStore` (see `db_storage`)
//! backs the service in production; `MemoryStore` backs tests and local runs
//! without a database.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;

/// A stored document and its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the whole document.
    Replace,
    /// Deep-merge into the existing document, creating it if absent.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Condition on a dotted field path such as `contact.suburb`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
}

impl FieldFilter {
    pub fn path(&self) -> &str {
        match self {
            FieldFilter::Eq(path, _) | FieldFilter::Gte(path, _) | FieldFilter::Lte(path, _) => {
                path
            }
        }
    }
}

/// Filters, ordering and pagination over a single collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<(String, SortDirection)>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::Eq(path.to_string(), value.into()));
        self
    }

    pub fn where_gte(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::Gte(path.to_string(), value.into()));
        self
    }

    pub fn where_lte(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::Lte(path.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, path: &str, direction: SortDirection) -> Self {
        self.order_by = Some((path.to_string(), direction));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Single-document read-modify-write step run inside `transact`.
pub type Mutation = Box<dyn FnOnce(Value) -> Result<Value, AppError> + Send>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), AppError>;

    async fn query(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, AppError>;

    /// Applies `mutation` to the current document atomically.
    ///
    /// Returns `Ok(None)` without writing when the document does not exist.
    /// An error from `mutation` aborts the transaction unchanged.
    async fn transact(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> Result<Option<Document>, AppError>;

    fn generate_id(&self) -> String {
        generate_id()
    }
}

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LENGTH: usize = 20;

/// Random 20-character alphanumeric document id.
pub fn generate_id() -> String {
    let mut bits = Uuid::new_v4().as_u128();
    let base = ID_ALPHABET.len() as u128;
    (0..ID_LENGTH)
        .map(|_| {
            let c = ID_ALPHABET[(bits % base) as usize] as char;
            bits /= base;
            c
        })
        .collect()
}

/// Deep-merges `patch` into `target`: objects merge key by key, anything else replaces.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                let nested = value.is_object() && existing.get(&key).is_some_and(Value::is_object);
                if !nested {
                    existing.insert(key, value);
                } else if let Some(slot) = existing.get_mut(&key) {
                    merge_json(slot, value);
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Resolves a dotted path (`metadata.created_at`) inside a document.
pub fn value_at_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, segment| current.get(segment))
        .filter(|v| !v.is_null())
}

/// Ordering between two stored values of the same kind; `None` for mixed kinds.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches_filter(data: &Value, filter: &FieldFilter) -> bool {
    let Some(actual) = value_at_path(data, filter.path()) else {
        return false;
    };
    match filter {
        FieldFilter::Eq(_, expected) => actual == expected,
        FieldFilter::Gte(_, bound) => {
            matches!(compare_values(actual, bound), Some(Ordering::Greater | Ordering::Equal))
        }
        FieldFilter::Lte(_, bound) => {
            matches!(compare_values(actual, bound), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

/// In-process document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, Value>>>, AppError>
    {
        self.collections
            .lock()
            .map_err(|_| AppError::StoreError("memory store lock poisoned".to_string()))
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), AppError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match mode {
            WriteMode::Replace => {
                docs.insert(id.to_string(), data);
            }
            WriteMode::Merge => {
                let slot = docs
                    .entry(id.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                merge_json(slot, data);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, AppError> {
        let collections = self.lock()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, data)| query.filters.iter().all(|f| matches_filter(data, f)))
            .filter(|(_, data)| {
                query
                    .order_by
                    .as_ref()
                    .map_or(true, |(path, _)| value_at_path(data, path).is_some())
            })
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        if let Some((path, direction)) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = match (value_at_path(&a.data, path), value_at_path(&b.data, path)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> Result<Option<Document>, AppError> {
        let mut collections = self.lock()?;
        let Some(current) = collections.get(collection).and_then(|docs| docs.get(id)) else {
            return Ok(None);
        };

        let next = mutation(current.clone())?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), next.clone());

        Ok(Some(Document {
            id: id.to_string(),
            data: next,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_deep_for_objects_only() {
        let mut doc = json!({
            "metadata": { "created_at": "a", "tags": ["x"] },
            "contact": { "name": "Ana" }
        });
        merge_json(
            &mut doc,
            json!({ "metadata": { "deleted_at": "b", "tags": ["y"] } }),
        );

        assert_eq!(
            doc,
            json!({
                "metadata": { "created_at": "a", "tags": ["y"], "deleted_at": "b" },
                "contact": { "name": "Ana" }
            })
        );
    }

    #[test]
    fn generated_ids_are_alphanumeric() {
        let id = generate_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_id());
    }

    #[tokio::test]
    async fn query_filters_orders_and_paginates() {
        let store = MemoryStore::new();
        for (id, suburb, created) in [
            ("a", "Richmond", "2026-01-01"),
            ("b", "Carlton", "2026-01-02"),
            ("c", "Richmond", "2026-01-03"),
            ("d", "Richmond", "2026-01-04"),
        ] {
            store
                .set(
                    "leads",
                    id,
                    json!({ "contact": { "suburb": suburb }, "metadata": { "created_at": created } }),
                    WriteMode::Replace,
                )
                .await
                .unwrap();
        }

        let query = DocumentQuery::new()
            .where_eq("contact.suburb", "Richmond")
            .order_by("metadata.created_at", SortDirection::Desc)
            .offset(1)
            .limit(5);
        let ids: Vec<String> = store
            .query("leads", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();

        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn range_filters_use_byte_order_and_skip_missing_fields() {
        let store = MemoryStore::new();
        store
            .set("leads", "a", json!({ "contact": { "address": "12 Swan St" } }), WriteMode::Replace)
            .await
            .unwrap();
        store
            .set("leads", "b", json!({ "contact": { "address": "14 Church St" } }), WriteMode::Replace)
            .await
            .unwrap();
        store
            .set("leads", "c", json!({ "contact": {} }), WriteMode::Replace)
            .await
            .unwrap();

        let query = DocumentQuery::new()
            .where_gte("contact.address", "12")
            .where_lte("contact.address", "12\u{f8ff}");
        let docs = store.query("leads", &query).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
    }

    #[tokio::test]
    async fn transact_on_missing_document_writes_nothing() {
        let store = MemoryStore::new();
        let result = store
            .transact("leads", "ghost", Box::new(|doc: Value| Ok::<Value, AppError>(doc)))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.count("leads"), 0);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_document_untouched() {
        let store = MemoryStore::new();
        store
            .set("leads", "a", json!({ "n": 1 }), WriteMode::Replace)
            .await
            .unwrap();

        let result = store
            .transact(
                "leads",
                "a",
                Box::new(|_: Value| Err::<Value, AppError>(AppError::BadRequest("nope".into()))),
            )
            .await;

        assert!(result.is_err());
        let doc = store.get("leads", "a").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn merge_set_creates_missing_document() {
        let store = MemoryStore::new();
        store
            .set("footer", "main", json!({ "message": "hi" }), WriteMode::Merge)
            .await
            .unwrap();
        store
            .set("footer", "main", json!({ "active": false }), WriteMode::Merge)
            .await
            .unwrap();

        let doc = store.get("footer", "main").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({ "message": "hi", "active": false }));
    }
}
