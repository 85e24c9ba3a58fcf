//! Cached posts, including the viewer's like/bookmark flags

use libsql::{params, Connection, Row};

use super::row::{flag, get_flag, get_json_list, json_text, opt_text, parse_id, text_or_null, to_i64};
use crate::error::Result;
use crate::models::{Post, PostId, UserId};
use crate::util::now_millis;

const POST_COLUMNS: &str = "id, user_id, username, user_profile_image_url, image_url, image_key, \
     caption, category, tags, likes_count, comments_count, created_at, is_liked, is_bookmarked";

/// DAO for the `posts` table
pub struct PostDao<'a> {
    conn: &'a Connection,
}

impl<'a> PostDao<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or update a post; `in_feed` only ever turns the feed flag on
    pub async fn upsert(&self, post: &Post, in_feed: bool) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO posts ({POST_COLUMNS}, in_feed, cached_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                        user_id = excluded.user_id,
                        username = excluded.username,
                        user_profile_image_url = excluded.user_profile_image_url,
                        image_url = excluded.image_url,
                        image_key = excluded.image_key,
                        caption = excluded.caption,
                        category = excluded.category,
                        tags = excluded.tags,
                        likes_count = excluded.likes_count,
                        comments_count = excluded.comments_count,
                        created_at = excluded.created_at,
                        is_liked = excluded.is_liked,
                        is_bookmarked = excluded.is_bookmarked,
                        in_feed = MAX(posts.in_feed, excluded.in_feed),
                        cached_at = excluded.cached_at"
                ),
                params![
                    post.id.as_str(),
                    post.user_id.as_str(),
                    post.username.as_str(),
                    text_or_null(post.user_profile_image_url.as_deref()),
                    post.image_url.as_str(),
                    post.image_key.as_str(),
                    post.caption.as_str(),
                    text_or_null(post.category.as_deref()),
                    json_text(&post.tags)?,
                    post.likes_count,
                    post.comments_count,
                    post.created_at,
                    flag(post.is_liked),
                    flag(post.is_bookmarked),
                    flag(in_feed),
                    now_millis()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_many(&self, posts: &[Post]) -> Result<()> {
        for post in posts {
            self.upsert(post, false).await?;
        }
        Ok(())
    }

    /// Replace the cached feed with a freshly loaded one
    pub async fn replace_feed(&self, posts: &[Post]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            self.conn
                .execute("UPDATE posts SET in_feed = 0 WHERE in_feed = 1", ())
                .await?;
            for post in posts {
                self.upsert(post, true).await?;
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

    pub async fn get(&self, id: &PostId) -> Result<Option<Post>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"),
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_post(&row)?)),
            None => Ok(None),
        }
    }

    /// Feed posts, newest first
    pub async fn list_feed(&self, limit: usize) -> Result<Vec<Post>> {
        self.list_where("in_feed = 1", "created_at DESC", params![to_i64(limit)])
            .await
    }

    pub async fn list_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<Post>> {
        self.list_where(
            "user_id = ?",
            "created_at DESC",
            params![user_id.as_str(), to_i64(limit)],
        )
        .await
    }

    pub async fn list_by_category(&self, category: &str, limit: usize) -> Result<Vec<Post>> {
        self.list_where(
            "category = ?",
            "created_at DESC",
            params![category, to_i64(limit)],
        )
        .await
    }

    /// Most liked posts
    pub async fn list_trending(&self, limit: usize) -> Result<Vec<Post>> {
        self.list_where("1 = 1", "likes_count DESC, created_at DESC", params![to_i64(limit)])
            .await
    }

    pub async fn list_bookmarked(&self, limit: usize) -> Result<Vec<Post>> {
        self.list_where("is_bookmarked = 1", "created_at DESC", params![to_i64(limit)])
            .await
    }

    async fn list_where(
        &self,
        condition: &str,
        order: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Post>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts WHERE {condition} ORDER BY {order} LIMIT ?"
                ),
                params,
            )
            .await?;

        let mut posts = Vec::new();
        while let Some(row) = rows.next().await? {
            posts.push(Self::parse_post(&row)?);
        }
        Ok(posts)
    }

    pub async fn set_bookmarked(&self, id: &PostId, bookmarked: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE posts SET is_bookmarked = ? WHERE id = ?",
                params![flag(bookmarked), id.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn adjust_comments_count(&self, id: &PostId, delta: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE posts SET comments_count = MAX(comments_count + ?, 0) WHERE id = ?",
                params![delta, id.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &PostId) -> Result<()> {
        self.conn
            .execute("DELETE FROM posts WHERE id = ?", params![id.as_str()])
            .await?;
        Ok(())
    }

    /// Drop every cached post by an author on account deletion
    pub async fn delete_by_user(&self, user_id: &UserId) -> Result<()> {
        self.conn
            .execute("DELETE FROM posts WHERE user_id = ?", params![user_id.as_str()])
            .await?;
        Ok(())
    }

    fn parse_post(row: &Row) -> Result<Post> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        Ok(Post {
            id: parse_id(&id, "post")?,
            user_id: UserId::new(user_id),
            username: row.get(2)?,
            user_profile_image_url: opt_text(row, 3)?,
            image_url: row.get(4)?,
            image_key: row.get(5)?,
            caption: row.get(6)?,
            category: opt_text(row, 7)?,
            tags: get_json_list(row, 8)?,
            likes_count: row.get(9)?,
            comments_count: row.get(10)?,
            created_at: row.get(11)?,
            is_liked: get_flag(row, 12)?,
            is_bookmarked: get_flag(row, 13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{PostDraft, User};
    use pretty_assertions::assert_eq;

    fn post(author: &str, caption: &str, category: Option<&str>, created_at: i64) -> Post {
        let user = User::new(UserId::new(author), author, "x@example.com", "");
        let draft = PostDraft::new(caption, category, vec![1], "a.jpg", "image/jpeg").unwrap();
        let mut post = Post::new(&user, &draft, "https://cdn/a.jpg".to_string(), "k".to_string());
        post.created_at = created_at;
        post
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_and_get_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = PostDao::new(db.connection());

        let mut p = post("alice", "Hello #world", Some("travel"), 10);
        p.is_liked = true;
        p.likes_count = 4;
        dao.upsert(&p, false).await.unwrap();

        let fetched = dao.get(&p.id).await.unwrap().unwrap();
        assert_eq!(fetched, p);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_feed_resets_previous_membership() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = PostDao::new(db.connection());

        let old = post("alice", "old", None, 1);
        let new = post("bob", "new", None, 2);
        dao.replace_feed(&[old.clone()]).await.unwrap();
        dao.replace_feed(&[new.clone()]).await.unwrap();

        let feed = dao.list_feed(10).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, new.id);
        // The old post stays cached, just not in the feed
        assert!(dao.get(&old.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_does_not_drop_feed_membership() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = PostDao::new(db.connection());

        let p = post("alice", "x", None, 1);
        dao.replace_feed(&[p.clone()]).await.unwrap();
        dao.upsert(&p, false).await.unwrap();

        assert_eq!(dao.list_feed(10).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_filters_and_orders() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = PostDao::new(db.connection());

        let mut a = post("alice", "a", Some("food"), 1);
        a.likes_count = 9;
        let b = post("alice", "b", Some("travel"), 2);
        let mut c = post("bob", "c", Some("food"), 3);
        c.is_bookmarked = true;
        dao.upsert_many(&[a.clone(), b.clone(), c.clone()]).await.unwrap();

        let by_alice = dao.list_by_user(&UserId::new("alice"), 10).await.unwrap();
        assert_eq!(by_alice.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let food = dao.list_by_category("food", 10).await.unwrap();
        assert_eq!(food.iter().map(|p| p.id).collect::<Vec<_>>(), vec![c.id, a.id]);

        let trending = dao.list_trending(1).await.unwrap();
        assert_eq!(trending[0].id, a.id);

        let saved = dao.list_bookmarked(10).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, c.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counters_update_in_place() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = PostDao::new(db.connection());
        let p = post("alice", "x", None, 1);
        dao.upsert(&p, false).await.unwrap();

        dao.adjust_comments_count(&p.id, 2).await.unwrap();
        dao.adjust_comments_count(&p.id, -3).await.unwrap();
        dao.set_bookmarked(&p.id, true).await.unwrap();

        let fetched = dao.get(&p.id).await.unwrap().unwrap();
        assert!(fetched.is_bookmarked);
        assert_eq!(fetched.comments_count, 0);
    }
}
