//! Documents, queries and writes understood by every document store

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Maximum number of values in an `In` filter
pub const MAX_IN_VALUES: usize = 10;

/// Field map of a document
pub type Fields = serde_json::Map<String, Value>;

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode the fields into a model
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Serialize a model into document fields
pub fn to_fields<T: Serialize>(model: &T) -> Result<Fields> {
    match serde_json::to_value(model)? {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::InvalidInput(format!(
            "documents must serialize to an object, got {other}"
        ))),
    }
}

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    /// Field equals one of up to [`MAX_IN_VALUES`] values
    In,
    /// Array field contains the value
    ArrayContains,
    Gte,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A single-collection query: conjunction of filters, one ordering, a limit
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    #[must_use]
    pub fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        self.filter(field, FilterOp::In, Value::Array(values))
    }

    #[must_use]
    pub fn where_array_contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::ArrayContains, value)
    }

    /// Match string fields starting with `prefix`
    #[must_use]
    pub fn where_prefix(self, field: &str, prefix: &str) -> Self {
        self.filter(field, FilterOp::Gte, prefix)
            .filter(field, FilterOp::Lte, format!("{prefix}\u{f8ff}"))
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject queries the backend would refuse
    pub fn validate(&self) -> Result<()> {
        for filter in &self.filters {
            if filter.op == FilterOp::In {
                let count = filter.value.as_array().map_or(0, Vec::len);
                if count == 0 || count > MAX_IN_VALUES {
                    return Err(Error::InvalidInput(format!(
                        "'in' filter on {} needs 1-{MAX_IN_VALUES} values, got {count}",
                        filter.field
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Server-side field transform
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTransform {
    Increment(i64),
    /// Append values not already present
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of the values
    ArrayRemove(Vec<Value>),
}

/// One write in an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or fully replace a document
    Set {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Overwrite only the given fields, creating the document if missing
    Merge {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Overwrite only the given fields of an existing document; the whole
    /// batch fails with [`crate::Error::NotFound`] when it is gone
    Update {
        collection: String,
        id: String,
        fields: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
    /// Apply transforms, creating the document if missing
    Transform {
        collection: String,
        id: String,
        transforms: Vec<(String, FieldTransform)>,
    },
}

impl Write {
    pub fn set<T: Serialize>(collection: &str, id: impl Into<String>, model: &T) -> Result<Self> {
        Ok(Self::Set {
            collection: collection.to_string(),
            id: id.into(),
            fields: to_fields(model)?,
        })
    }

    pub fn merge(collection: &str, id: impl Into<String>, fields: Fields) -> Self {
        Self::Merge {
            collection: collection.to_string(),
            id: id.into(),
            fields,
        }
    }

    pub fn update(collection: &str, id: impl Into<String>, fields: Fields) -> Self {
        Self::Update {
            collection: collection.to_string(),
            id: id.into(),
            fields,
        }
    }

    pub fn delete(collection: &str, id: impl Into<String>) -> Self {
        Self::Delete {
            collection: collection.to_string(),
            id: id.into(),
        }
    }

    pub fn increment(collection: &str, id: impl Into<String>, field: &str, by: i64) -> Self {
        Self::transform(collection, id, vec![(field.to_string(), FieldTransform::Increment(by))])
    }

    pub fn transform(
        collection: &str,
        id: impl Into<String>,
        transforms: Vec<(String, FieldTransform)>,
    ) -> Self {
        Self::Transform {
            collection: collection.to_string(),
            id: id.into(),
            transforms,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Set { collection, .. }
            | Self::Merge { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Transform { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Set { id, .. }
            | Self::Merge { id, .. }
            | Self::Update { id, .. }
            | Self::Delete { id, .. }
            | Self::Transform { id, .. } => id,
        }
    }
}

/// A remote document database
///
/// The remote store is the source of truth for every entity. Batches passed
/// to [`DocumentStore::commit`] are applied atomically.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>>> + Send;

    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Document>>> + Send;

    fn commit(&self, writes: Vec<Write>) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_prefix_adds_range() {
        let query = Query::collection("users").where_prefix("username", "al");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].op, FilterOp::Gte);
        assert_eq!(query.filters[1].value, json!("al\u{f8ff}"));
    }

    #[test]
    fn validate_limits_in_filters() {
        let ok = Query::collection("posts").where_in("userId", vec![json!("a"), json!("b")]);
        assert!(ok.validate().is_ok());

        let too_many = Query::collection("posts")
            .where_in("userId", (0..11).map(|i| json!(i)).collect());
        assert!(too_many.validate().is_err());

        let empty = Query::collection("posts").where_in("userId", Vec::new());
        assert!(empty.validate().is_err());
    }

    #[test]
    fn to_fields_requires_object() {
        assert!(to_fields(&json!({"a": 1})).is_ok());
        assert!(to_fields(&json!([1, 2])).is_err());
    }
}
