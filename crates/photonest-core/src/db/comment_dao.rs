//! Cached comments

use libsql::{params, Connection, Row};

use super::row::{opt_text, parse_id, text_or_null, to_i64};
use crate::error::Result;
use crate::models::{Comment, CommentId, PostId, UserId};

const COMMENT_COLUMNS: &str =
    "id, post_id, user_id, username, user_profile_image_url, text, parent_id, created_at";

/// DAO for the `comments` table
pub struct CommentDao<'a> {
    conn: &'a Connection,
}

impl<'a> CommentDao<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn upsert(&self, comment: &Comment) -> Result<()> {
        let parent_id = comment.parent_id.map(|id| id.as_str());
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO comments ({COMMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    comment.id.as_str(),
                    comment.post_id.as_str(),
                    comment.user_id.as_str(),
                    comment.username.as_str(),
                    text_or_null(comment.user_profile_image_url.as_deref()),
                    comment.text.as_str(),
                    text_or_null(parent_id.as_deref()),
                    comment.created_at
                ],
            )
            .await?;
        Ok(())
    }

    /// Replace every cached comment of a post with a fresh remote listing
    pub async fn replace_for_post(&self, post_id: &PostId, comments: &[Comment]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            self.delete_for_post(post_id).await?;
            for comment in comments {
                self.upsert(comment).await?;
            }
            Ok::<(), crate::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    /// Comments of a post, oldest first
    pub async fn list_for_post(&self, post_id: &PostId, limit: usize) -> Result<Vec<Comment>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM comments
                     WHERE post_id = ?
                     ORDER BY created_at ASC
                     LIMIT ?"
                ),
                params![post_id.as_str(), to_i64(limit)],
            )
            .await?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await? {
            comments.push(Self::parse_comment(&row)?);
        }
        Ok(comments)
    }

    pub async fn get(&self, id: &CommentId) -> Result<Option<Comment>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"),
                params![id.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_comment(&row)?)),
            None => Ok(None),
        }
    }

    /// Delete a comment and its direct replies
    pub async fn delete_with_replies(&self, id: &CommentId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM comments WHERE id = ?1 OR parent_id = ?1",
                params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_for_post(&self, post_id: &PostId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM comments WHERE post_id = ?",
                params![post_id.as_str()],
            )
            .await?;
        Ok(())
    }

    fn parse_comment(row: &Row) -> Result<Comment> {
        let id: String = row.get(0)?;
        let post_id: String = row.get(1)?;
        let user_id: String = row.get(2)?;
        let parent_id = opt_text(row, 6)?
            .map(|raw| parse_id::<CommentId>(&raw, "comment"))
            .transpose()?;
        Ok(Comment {
            id: parse_id(&id, "comment")?,
            post_id: parse_id(&post_id, "post")?,
            user_id: UserId::new(user_id),
            username: row.get(3)?,
            user_profile_image_url: opt_text(row, 4)?,
            text: row.get(5)?,
            parent_id,
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::User;

    fn author() -> User {
        User::new(UserId::new("u1"), "alice", "a@example.com", "")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_and_list_for_post() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = CommentDao::new(db.connection());
        let post = PostId::new();

        let stale = Comment::new(post, &author(), "stale", None).unwrap();
        dao.upsert(&stale).await.unwrap();

        let mut first = Comment::new(post, &author(), "first", None).unwrap();
        first.created_at = 1;
        let mut reply = Comment::new(post, &author(), "reply", Some(first.id)).unwrap();
        reply.created_at = 2;
        dao.replace_for_post(&post, &[reply.clone(), first.clone()])
            .await
            .unwrap();

        let listed = dao.list_for_post(&post, 10).await.unwrap();
        assert_eq!(listed, vec![first, reply]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_removes_replies() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = CommentDao::new(db.connection());
        let post = PostId::new();

        let root = Comment::new(post, &author(), "root", None).unwrap();
        let reply = Comment::new(post, &author(), "reply", Some(root.id)).unwrap();
        let other = Comment::new(post, &author(), "other", None).unwrap();
        for comment in [&root, &reply, &other] {
            dao.upsert(comment).await.unwrap();
        }

        dao.delete_with_replies(&root.id).await.unwrap();
        let listed = dao.list_for_post(&post, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, other.id);
        assert!(dao.get(&reply.id).await.unwrap().is_none());
    }
}
