//! Cached notifications

use libsql::{params, Connection, Row};

use super::row::{flag, get_flag, opt_text, parse_id, text_or_null, to_i64};
use crate::error::{Error, Result};
use crate::models::{Notification, NotificationId, UserId};

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, actor_id, actor_username, \
     actor_profile_image_url, kind, post_id, message, is_read, created_at";

/// DAO for the `notifications` table
pub struct NotificationDao<'a> {
    conn: &'a Connection,
}

impl<'a> NotificationDao<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn upsert(&self, notification: &Notification) -> Result<()> {
        let post_id = notification.post_id.map(|id| id.as_str());
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO notifications ({NOTIFICATION_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    notification.id.as_str(),
                    notification.recipient_id.as_str(),
                    notification.actor_id.as_str(),
                    notification.actor_username.as_str(),
                    text_or_null(notification.actor_profile_image_url.as_deref()),
                    notification.kind.as_str(),
                    text_or_null(post_id.as_deref()),
                    notification.message.as_str(),
                    flag(notification.is_read),
                    notification.created_at
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_many(&self, notifications: &[Notification]) -> Result<()> {
        for notification in notifications {
            self.upsert(notification).await?;
        }
        Ok(())
    }

    /// Notifications for a recipient, newest first
    pub async fn list_for(&self, recipient_id: &UserId, limit: usize) -> Result<Vec<Notification>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                     WHERE recipient_id = ?
                     ORDER BY created_at DESC
                     LIMIT ?"
                ),
                params![recipient_id.as_str(), to_i64(limit)],
            )
            .await?;

        let mut notifications = Vec::new();
        while let Some(row) = rows.next().await? {
            notifications.push(Self::parse_notification(&row)?);
        }
        Ok(notifications)
    }

    pub async fn unread_count(&self, recipient_id: &UserId) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = 0",
                params![recipient_id.as_str()],
            )
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?",
                params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient_id: &UserId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?",
                params![recipient_id.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &NotificationId) -> Result<()> {
        self.conn
            .execute("DELETE FROM notifications WHERE id = ?", params![id.as_str()])
            .await?;
        Ok(())
    }

    fn parse_notification(row: &Row) -> Result<Notification> {
        let id: String = row.get(0)?;
        let recipient_id: String = row.get(1)?;
        let actor_id: String = row.get(2)?;
        let kind: String = row.get(5)?;
        let post_id = opt_text(row, 6)?
            .map(|raw| parse_id(&raw, "post"))
            .transpose()?;
        Ok(Notification {
            id: parse_id(&id, "notification")?,
            recipient_id: UserId::new(recipient_id),
            actor_id: UserId::new(actor_id),
            actor_username: row.get(3)?,
            actor_profile_image_url: opt_text(row, 4)?,
            kind: kind.parse().map_err(Error::Database)?,
            post_id,
            message: row.get(7)?,
            is_read: get_flag(row, 8)?,
            created_at: row.get(9)?,
        })
    }
}
