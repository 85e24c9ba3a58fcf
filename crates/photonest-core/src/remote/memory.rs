//! In-process document store for tests and demo mode

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::document::{
    Direction, Document, DocumentStore, FieldTransform, Fields, Filter, FilterOp, Query, Write,
};
use crate::error::{Error, Result};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// Document store kept entirely in memory
///
/// Clones share the same data. [`InMemoryDocumentStore::set_offline`]
/// makes every call fail with [`Error::Network`] so cache fallbacks can be
/// exercised.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    offline: Arc<AtomicBool>,
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("offline", &self.is_offline())
            .finish_non_exhaustive()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(AtomicOrdering::SeqCst)
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.read()
            .map(|collections| collections.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_offline() {
            Err(Error::Network("document store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| Error::Remote("document store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| Error::Remote("document store lock poisoned".to_string()))
    }

    fn get_sync(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.ensure_online()?;
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    fn query_sync(&self, query: &Query) -> Result<Vec<Document>> {
        self.ensure_online()?;
        query.validate()?;
        let collections = self.read()?;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, fields)| query.filters.iter().all(|filter| matches(fields, filter)))
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect();

        if let Some((field, direction)) = &query.order_by {
            // documents without the ordering field are excluded
            matched.retain(|doc| doc.fields.contains_key(field));
            matched.sort_by(|a, b| {
                let ordering = compare_values(&a.fields[field], &b.fields[field])
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn commit_sync(&self, writes: Vec<Write>) -> Result<()> {
        self.ensure_online()?;
        let mut collections = self.write()?;
        // apply to a copy so a failing write leaves nothing behind
        let mut staged = collections.clone();
        for write in writes {
            apply_write(&mut staged, write)?;
        }
        *collections = staged;
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.get_sync(collection, id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.query_sync(query)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        self.commit_sync(writes)
    }
}

fn apply_write(collections: &mut Collections, write: Write) -> Result<()> {
    if write.id().is_empty() {
        return Err(Error::InvalidInput("document id must not be empty".to_string()));
    }
    match write {
        Write::Set {
            collection,
            id,
            fields,
        } => {
            collections.entry(collection).or_default().insert(id, fields);
        }
        Write::Merge {
            collection,
            id,
            fields,
        } => {
            let doc = collections
                .entry(collection)
                .or_default()
                .entry(id)
                .or_default();
            doc.extend(fields);
        }
        Write::Update {
            collection,
            id,
            fields,
        } => {
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or_else(|| Error::NotFound(format!("No document to update: {collection}/{id}")))?;
            doc.extend(fields);
        }
        Write::Delete { collection, id } => {
            if let Some(docs) = collections.get_mut(&collection) {
                docs.remove(&id);
            }
        }
        Write::Transform {
            collection,
            id,
            transforms,
        } => {
            let doc = collections
                .entry(collection)
                .or_default()
                .entry(id)
                .or_default();
            for (field, transform) in transforms {
                apply_transform(doc, field, transform)?;
            }
        }
    }
    Ok(())
}

fn apply_transform(doc: &mut Fields, field: String, transform: FieldTransform) -> Result<()> {
    match transform {
        FieldTransform::Increment(by) => {
            let current = match doc.get(&field) {
                None | Some(Value::Null) => 0,
                Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                    Error::InvalidInput(format!("field {field} is not an integer"))
                })?,
                Some(_) => {
                    return Err(Error::InvalidInput(format!("field {field} is not numeric")));
                }
            };
            doc.insert(field, Value::from(current.saturating_add(by)));
        }
        FieldTransform::ArrayUnion(values) => {
            let array = array_field(doc, field)?;
            for value in values {
                if !array.iter().any(|existing| values_equal(existing, &value)) {
                    array.push(value);
                }
            }
        }
        FieldTransform::ArrayRemove(values) => {
            let array = array_field(doc, field)?;
            array.retain(|existing| !values.iter().any(|value| values_equal(existing, value)));
        }
    }
    Ok(())
}

fn array_field(doc: &mut Fields, field: String) -> Result<&mut Vec<Value>> {
    let slot = doc.entry(field.clone()).or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| Error::InvalidInput(format!("field {field} is not an array")))
}

fn matches(fields: &Fields, filter: &Filter) -> bool {
    let Some(actual) = fields.get(&filter.field) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => values_equal(actual, &filter.value),
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|c| values_equal(actual, c))),
        FilterOp::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(item, &filter.value))),
        FilterOp::Gte => matches!(
            compare_values(actual, &filter.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOp::Lte => matches!(
            compare_values(actual, &filter.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Order two values of the same type; values of different types don't compare
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .commit(vec![
                Write::Set {
                    collection: "posts".to_string(),
                    id: "p1".to_string(),
                    fields: fields(json!({"userId": "a", "likesCount": 5, "tags": ["sun"], "createdAt": 1})),
                },
                Write::Set {
                    collection: "posts".to_string(),
                    id: "p2".to_string(),
                    fields: fields(json!({"userId": "b", "likesCount": 9, "tags": ["sea", "sun"], "createdAt": 2})),
                },
                Write::Set {
                    collection: "posts".to_string(),
                    id: "p3".to_string(),
                    fields: fields(json!({"userId": "c", "likesCount": 1, "tags": [], "createdAt": 3})),
                },
            ])
            .await
            .unwrap();
        store
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|doc| doc.id.as_str()).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_filters_orders_and_limits() {
        let store = seeded().await;

        let docs = store
            .query(
                &Query::collection("posts")
                    .where_in("userId", vec![json!("a"), json!("b")])
                    .order_by("createdAt", Direction::Descending),
            )
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["p2", "p1"]);

        let docs = store
            .query(&Query::collection("posts").where_array_contains("tags", "sun"))
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["p1", "p2"]);

        let docs = store
            .query(
                &Query::collection("posts")
                    .order_by("likesCount", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["p2", "p1"]);

        let docs = store
            .query(&Query::collection("posts").filter("likesCount", FilterOp::Gte, 5))
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["p1", "p2"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prefix_query_matches_strings() {
        let store = InMemoryDocumentStore::new();
        for (id, name) in [("1", "alice"), ("2", "alfred"), ("3", "bob")] {
            store
                .commit(vec![Write::merge(
                    "users",
                    id,
                    fields(json!({ "username": name })),
                )])
                .await
                .unwrap();
        }

        let docs = store
            .query(&Query::collection("users").where_prefix("username", "al"))
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec!["1", "2"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transforms_create_missing_documents() {
        let store = InMemoryDocumentStore::new();
        store
            .commit(vec![
                Write::increment("categories", "food", "postCount", 1),
                Write::increment("categories", "food", "postCount", 1),
                Write::transform(
                    "users",
                    "u1",
                    vec![(
                        "followers".to_string(),
                        FieldTransform::ArrayUnion(vec![json!("u2"), json!("u2")]),
                    )],
                ),
            ])
            .await
            .unwrap();

        let category = store.get("categories", "food").await.unwrap().unwrap();
        assert_eq!(category.fields["postCount"], json!(2));
        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.fields["followers"], json!(["u2"]));

        store
            .commit(vec![Write::transform(
                "users",
                "u1",
                vec![(
                    "followers".to_string(),
                    FieldTransform::ArrayRemove(vec![json!("u2")]),
                )],
            )])
            .await
            .unwrap();
        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.fields["followers"], json!([]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_batch_applies_nothing() {
        let store = seeded().await;
        let result = store
            .commit(vec![
                Write::delete("posts", "p1"),
                Write::increment("posts", "p2", "tags", 1),
            ])
            .await;
        assert!(result.is_err());
        assert!(store.get("posts", "p1").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_never_recreates_deleted_documents() {
        let store = seeded().await;
        store
            .commit(vec![Write::update("posts", "p1", fields(json!({"caption": "new"})))])
            .await
            .unwrap();
        let post = store.get("posts", "p1").await.unwrap().unwrap();
        assert_eq!(post.fields["caption"], json!("new"));
        assert_eq!(post.fields["likesCount"], json!(5));

        let error = store
            .commit(vec![
                Write::increment("posts", "p2", "likesCount", 1),
                Write::update("posts", "gone", fields(json!({"caption": "x"}))),
            ])
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
        assert!(store.get("posts", "gone").await.unwrap().is_none());
        let untouched = store.get("posts", "p2").await.unwrap().unwrap();
        assert_eq!(untouched.fields["likesCount"], json!(9));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_store_fails_with_network_error() {
        let store = seeded().await;
        store.set_offline(true);

        let error = store.get("posts", "p1").await.unwrap_err();
        assert!(error.is_network());
        assert!(store.commit(vec![Write::delete("posts", "p1")]).await.is_err());

        store.set_offline(false);
        assert_eq!(store.count("posts"), 3);
    }
}
