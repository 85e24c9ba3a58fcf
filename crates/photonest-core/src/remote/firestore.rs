//! Cloud Firestore over its REST API

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::document::{
    Direction, Document, DocumentStore, FieldTransform, Filter, FilterOp, Query, Write,
};
use super::value::{decode_fields, encode, encode_fields};
use crate::auth::SessionHandle;
use crate::error::{Error, Result};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: Client,
    base_url: String,
    /// `projects/{project}/databases/{database}/documents`
    root: String,
    session: SessionHandle,
}

impl std::fmt::Debug for FirestoreDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreDocumentStore")
            .field("base_url", &self.base_url)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FirestoreDocumentStore {
    pub fn new(project_id: &str, session: SessionHandle) -> Result<Self> {
        Self::with_base_url(FIRESTORE_URL, project_id, session)
    }

    pub fn with_base_url(base_url: &str, project_id: &str, session: SessionHandle) -> Result<Self> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(Error::InvalidInput(
                "Firestore project id must not be empty".to_string(),
            ));
        }
        let base_url = base_url.trim().trim_end_matches('/');
        if !crate::util::is_http_url(base_url) {
            return Err(Error::InvalidInput(
                "Firestore URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.to_string(),
            root: format!("projects/{project_id}/databases/{DEFAULT_DATABASE}/documents"),
            session,
        })
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.root,
            collection,
            urlencoding::encode(id)
        )
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.root, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.id_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn encode_write(&self, write: &Write) -> Value {
        match write {
            Write::Set {
                collection,
                id,
                fields,
            } => json!({
                "update": {
                    "name": self.document_name(collection, id),
                    "fields": encode_fields(fields),
                }
            }),
            Write::Merge {
                collection,
                id,
                fields,
            } => json!({
                "update": {
                    "name": self.document_name(collection, id),
                    "fields": encode_fields(fields),
                },
                "updateMask": { "fieldPaths": fields.keys().collect::<Vec<_>>() },
            }),
            Write::Update {
                collection,
                id,
                fields,
            } => json!({
                "update": {
                    "name": self.document_name(collection, id),
                    "fields": encode_fields(fields),
                },
                "updateMask": { "fieldPaths": fields.keys().collect::<Vec<_>>() },
                "currentDocument": { "exists": true },
            }),
            Write::Delete { collection, id } => json!({
                "delete": self.document_name(collection, id),
            }),
            Write::Transform {
                collection,
                id,
                transforms,
            } => {
                let field_transforms: Vec<Value> = transforms
                    .iter()
                    .map(|(field, transform)| encode_transform(field, transform))
                    .collect();
                json!({
                    "transform": {
                        "document": self.document_name(collection, id),
                        "fieldTransforms": field_transforms,
                    }
                })
            }
        }
    }
}

impl DocumentStore for FirestoreDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = format!("{}/{}", self.base_url, self.document_name(collection, id));
        let response = self.authorized(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = read_response(response).await?;
        raw.into_document().map(Some)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        query.validate()?;
        tracing::debug!(
            "Firestore query on {} with {} filter(s)",
            query.collection,
            query.filters.len()
        );
        let response = self
            .authorized(self.client.post(self.url(":runQuery")))
            .json(&json!({ "structuredQuery": structured_query(query) }))
            .send()
            .await?;
        let rows: Vec<RunQueryRow> = read_response(response).await?;
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(RawDocument::into_document)
            .collect()
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let encoded: Vec<Value> = writes.iter().map(|write| self.encode_write(write)).collect();
        tracing::debug!("Firestore commit with {} write(s)", encoded.len());
        let response = self
            .authorized(self.client.post(self.url(":commit")))
            .json(&json!({ "writes": encoded }))
            .send()
            .await?;
        let _: Value = read_response(response).await?;
        Ok(())
    }
}

fn structured_query(query: &Query) -> Value {
    let mut structured = json!({
        "from": [{ "collectionId": query.collection }],
    });

    let filters: Vec<Value> = query.filters.iter().map(encode_filter).collect();
    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.into_iter().next().unwrap_or(Value::Null),
        _ => {
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            });
        }
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{
            "field": { "fieldPath": field },
            "direction": direction,
        }]);
    }
    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }
    structured
}

fn encode_filter(filter: &Filter) -> Value {
    let op = match filter.op {
        FilterOp::Eq => "EQUAL",
        FilterOp::In => "IN",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
        FilterOp::Gte => "GREATER_THAN_OR_EQUAL",
        FilterOp::Lte => "LESS_THAN_OR_EQUAL",
    };
    json!({
        "fieldFilter": {
            "field": { "fieldPath": filter.field },
            "op": op,
            "value": encode(&filter.value),
        }
    })
}

fn encode_transform(field: &str, transform: &FieldTransform) -> Value {
    match transform {
        FieldTransform::Increment(by) => json!({
            "fieldPath": field,
            "increment": { "integerValue": by.to_string() },
        }),
        FieldTransform::ArrayUnion(values) => json!({
            "fieldPath": field,
            "appendMissingElements": { "values": values.iter().map(encode).collect::<Vec<_>>() },
        }),
        FieldTransform::ArrayRemove(values) => json!({
            "fieldPath": field,
            "removeAllFromArray": { "values": values.iter().map(encode).collect::<Vec<_>>() },
        }),
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

impl RawDocument {
    fn into_document(self) -> Result<Document> {
        let raw_id = self.name.rsplit('/').next().unwrap_or_default();
        let id = urlencoding::decode(raw_id)
            .map_err(|error| Error::Remote(format!("bad document name {}: {error}", self.name)))?
            .into_owned();
        let fields = match self.fields {
            Some(fields) => decode_fields(&fields)?,
            None => serde_json::Map::new(),
        };
        Ok(Document::new(id, fields))
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    #[serde(default)]
    document: Option<RawDocument>,
}

async fn read_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|payload| {
            payload["error"]["message"]
                .as_str()
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    Err(match status {
        StatusCode::UNAUTHORIZED => Error::Unauthenticated,
        StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::BAD_REQUEST => Error::InvalidInput(message),
        status if status.is_server_error() => {
            Error::Remote(format!("{message} ({})", status.as_u16()))
        }
        _ => Error::Remote(message),
    })
}
