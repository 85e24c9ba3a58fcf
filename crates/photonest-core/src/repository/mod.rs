//! Repositories: remote store as source of truth, local cache as fallback.
//!
//! Every repository follows the same shape. Reads go to the remote store and
//! write the result through to the cache; when the remote call fails they
//! serve cached rows instead, surfacing the remote error only when the cache
//! has nothing. Writes go to the remote store and return its error as-is.

mod auth;
mod comment;
mod notification;
mod post;
mod user;

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use auth::{AuthRepository, SignUpRequest};
pub use comment::CommentRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use user::UserRepository;

use crate::auth::{AuthProvider, SessionHandle};
use crate::db::LocalCache;
use crate::error::{Error, Result};
use crate::otp::OtpClient;
use crate::remote::{fetch_all, DocumentStore, Query, Write, MAX_IN_VALUES};
use crate::storage::MediaStorage;

/// Default number of items per list screen
pub const PAGE_SIZE: usize = 50;

/// Writes per commit when cascading deletes
const MAX_BATCH_WRITES: usize = 400;

/// Every repository wired to the same backend and cache
#[derive(Clone)]
pub struct Repositories<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub auth: AuthRepository<A, D, M>,
    pub users: UserRepository<D, M>,
    pub posts: PostRepository<D, M>,
    pub comments: CommentRepository<D>,
    pub notifications: NotificationRepository<D>,
}

impl<A, D, M> Repositories<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(
        auth: A,
        store: D,
        media: M,
        cache: LocalCache,
        session: SessionHandle,
        otp: Option<OtpClient>,
    ) -> Self {
        let notifications = NotificationRepository::new(store.clone(), cache.clone());
        let posts = PostRepository::new(
            store.clone(),
            media.clone(),
            cache.clone(),
            notifications.clone(),
        );
        Self {
            auth: AuthRepository::new(
                auth,
                store.clone(),
                cache.clone(),
                session,
                otp,
                posts.clone(),
            ),
            users: UserRepository::new(store.clone(), media, cache.clone(), notifications.clone()),
            posts,
            comments: CommentRepository::new(store, cache, notifications.clone()),
            notifications,
        }
    }
}

/// Serve cached data after a failed remote read
///
/// `cached` yields `None` when the cache has nothing useful, in which case
/// the remote error is returned.
pub(crate) async fn or_cached<T>(
    what: &str,
    remote_error: Error,
    cached: impl Future<Output = Result<Option<T>>>,
) -> Result<T> {
    tracing::warn!("Remote read of {} failed: {}", what, remote_error);
    match cached.await {
        Ok(Some(value)) => {
            tracing::debug!("Serving cached {}", what);
            Ok(value)
        }
        Ok(None) => Err(remote_error),
        Err(cache_error) => {
            tracing::warn!("Cache read of {} failed too: {}", what, cache_error);
            Err(remote_error)
        }
    }
}

pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Cache write-through failures never fail the operation
pub(crate) fn log_cache_write(what: &str, result: Result<()>) {
    if let Err(error) = result {
        tracing::warn!("Failed to update cached {}: {}", what, error);
    }
}

/// Run a query once per chunk of `values` with an `In` filter on `field`
pub(crate) async fn query_in_chunks<T, D>(
    store: &D,
    base: impl Fn() -> Query,
    field: &str,
    values: &[Value],
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    D: DocumentStore,
{
    let mut out = Vec::new();
    for chunk in values.chunks(MAX_IN_VALUES) {
        let query = base().where_in(field, chunk.to_vec());
        out.extend(fetch_all::<T, D>(store, &query).await?);
    }
    Ok(out)
}

/// Commit writes in several batches; used for best-effort cleanup only
pub(crate) async fn commit_chunked<D: DocumentStore>(store: &D, writes: Vec<Write>) -> Result<()> {
    let mut writes = writes;
    while !writes.is_empty() {
        let rest = writes.split_off(writes.len().min(MAX_BATCH_WRITES));
        store.commit(writes).await?;
        writes = rest;
    }
    Ok(())
}

/// Delete every document a query matches, logging instead of failing
pub(crate) async fn delete_matching<D: DocumentStore>(store: &D, query: Query) {
    let collection = query.collection.clone();
    let result = async {
        let docs = store.query(&query).await?;
        let writes = docs
            .iter()
            .map(|doc| Write::delete(&collection, doc.id.clone()))
            .collect();
        commit_chunked(store, writes).await
    }
    .await;
    if let Err(error) = result {
        tracing::warn!("Cleanup of {} documents failed: {}", collection, error);
    }
}
