//! Remote document store: the source of truth for every entity

mod document;
mod firestore;
mod memory;
mod value;

use serde::de::DeserializeOwned;

pub use document::{
    to_fields, Direction, Document, DocumentStore, FieldTransform, Fields, Filter, FilterOp,
    Query, Write, MAX_IN_VALUES,
};
pub use firestore::FirestoreDocumentStore;
pub use memory::InMemoryDocumentStore;

use crate::error::Result;

/// Fetch one document and decode it into a model
pub async fn fetch<T, D>(store: &D, collection: &str, id: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    D: DocumentStore,
{
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Run a query and decode every result, skipping documents that don't fit the model
pub async fn fetch_all<T, D>(store: &D, query: &Query) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    D: DocumentStore,
{
    let docs = store.query(query).await?;
    Ok(docs
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(model) => Some(model),
            Err(error) => {
                tracing::warn!(
                    "Skipping malformed {} document {}: {}",
                    query.collection,
                    doc.id,
                    error
                );
                None
            }
        })
        .collect())
}
