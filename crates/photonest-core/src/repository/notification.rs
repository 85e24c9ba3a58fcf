//! Activity notifications

use serde_json::Value;

use super::{commit_chunked, log_cache_write, non_empty, or_cached, PAGE_SIZE};
use crate::db::{LocalCache, NotificationDao};
use crate::error::{Error, Result};
use crate::models::{
    collections, fields, Notification, NotificationId, NotificationKind, PostId, User, UserId,
};
use crate::remote::{fetch_all, Direction, DocumentStore, Fields, Query, Write};

#[derive(Clone)]
pub struct NotificationRepository<D: DocumentStore> {
    store: D,
    cache: LocalCache,
}

impl<D: DocumentStore> NotificationRepository<D> {
    pub const fn new(store: D, cache: LocalCache) -> Self {
        Self { store, cache }
    }

    /// Newest notifications for `recipient`
    pub async fn notifications(&self, recipient: &UserId, limit: usize) -> Result<Vec<Notification>> {
        let query = Query::collection(collections::NOTIFICATIONS)
            .where_eq(fields::notification::RECIPIENT_ID, recipient.as_str())
            .order_by(fields::notification::CREATED_AT, Direction::Descending)
            .limit(limit);
        match fetch_all::<Notification, D>(&self.store, &query).await {
            Ok(notifications) => {
                let db = self.cache.lock().await;
                log_cache_write(
                    "notifications",
                    NotificationDao::new(db.connection())
                        .upsert_many(&notifications)
                        .await,
                );
                Ok(notifications)
            }
            Err(error) => {
                or_cached("notifications", error, async {
                    let db = self.cache.lock().await;
                    NotificationDao::new(db.connection())
                        .list_for(recipient, limit)
                        .await
                        .map(non_empty)
                })
                .await
            }
        }
    }

    pub async fn unread_count(&self, recipient: &UserId) -> Result<usize> {
        let query = Query::collection(collections::NOTIFICATIONS)
            .where_eq(fields::notification::RECIPIENT_ID, recipient.as_str())
            .where_eq(fields::notification::IS_READ, false);
        match self.store.query(&query).await {
            Ok(docs) => Ok(docs.len()),
            Err(error) => {
                or_cached("unread count", error, async {
                    let db = self.cache.lock().await;
                    NotificationDao::new(db.connection())
                        .unread_count(recipient)
                        .await
                        .map(Some)
                })
                .await
            }
        }
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.store
            .commit(vec![Write::update(
                collections::NOTIFICATIONS,
                id.as_str(),
                read_flag(),
            )])
            .await
            .map_err(|error| match error {
                Error::NotFound(_) => {
                    Error::NotFound("This notification was already deleted".to_string())
                }
                other => other,
            })?;
        let db = self.cache.lock().await;
        log_cache_write(
            "notification",
            NotificationDao::new(db.connection()).mark_read(id).await,
        );
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient: &UserId) -> Result<()> {
        let query = Query::collection(collections::NOTIFICATIONS)
            .where_eq(fields::notification::RECIPIENT_ID, recipient.as_str())
            .where_eq(fields::notification::IS_READ, false);
        let unread = self.store.query(&query).await?;
        let writes = unread
            .iter()
            .map(|doc| Write::update(collections::NOTIFICATIONS, doc.id.clone(), read_flag()))
            .collect();
        commit_chunked(&self.store, writes).await?;

        let db = self.cache.lock().await;
        log_cache_write(
            "notifications",
            NotificationDao::new(db.connection())
                .mark_all_read(recipient)
                .await,
        );
        Ok(())
    }

    pub async fn delete(&self, id: &NotificationId) -> Result<()> {
        self.store
            .commit(vec![Write::delete(collections::NOTIFICATIONS, id.as_str())])
            .await?;
        let db = self.cache.lock().await;
        log_cache_write(
            "notification",
            NotificationDao::new(db.connection()).delete(id).await,
        );
        Ok(())
    }

    /// Record an activity for `recipient`; acting on your own content is silent
    pub async fn notify(
        &self,
        recipient: &UserId,
        actor: &User,
        kind: NotificationKind,
        post_id: Option<PostId>,
        detail: Option<&str>,
    ) -> Result<Option<Notification>> {
        if recipient == &actor.id {
            return Ok(None);
        }
        let notification = Notification::new(recipient.clone(), actor, kind, post_id, detail);
        self.store
            .commit(vec![Write::set(
                collections::NOTIFICATIONS,
                notification.id.as_str(),
                &notification,
            )?])
            .await?;
        tracing::debug!("Notified {} ({})", recipient, kind);
        Ok(Some(notification))
    }

    /// Like [`Self::notify`], but a failure only logs; the triggering action already succeeded
    pub(crate) async fn notify_best_effort(
        &self,
        recipient: &UserId,
        actor: &User,
        kind: NotificationKind,
        post_id: Option<PostId>,
        detail: Option<&str>,
    ) {
        if let Err(error) = self.notify(recipient, actor, kind, post_id, detail).await {
            tracing::warn!("Failed to send {} notification to {}: {}", kind, recipient, error);
        }
    }

    /// Newest page for the default inbox view
    pub async fn inbox(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        self.notifications(recipient, PAGE_SIZE).await
    }
}

fn read_flag() -> Fields {
    let mut flag = Fields::new();
    flag.insert(fields::notification::IS_READ.to_string(), Value::Bool(true));
    flag
}
