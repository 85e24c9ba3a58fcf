//! Cached user profiles

use libsql::{params, Connection, Row};

use super::row::{flag, get_flag, get_json_list, json_text, opt_text, text_or_null, to_i64};
use crate::error::Result;
use crate::models::{User, UserId};
use crate::util::now_millis;

const USER_COLUMNS: &str = "id, username, email, full_name, bio, profile_image_url, \
     followers_count, following_count, posts_count, is_private, followers, following, created_at";

/// DAO for the `users` table
pub struct UserDao<'a> {
    conn: &'a Connection,
}

impl<'a> UserDao<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace a profile
    pub async fn upsert(&self, user: &User) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO users ({USER_COLUMNS}, cached_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    user.id.as_str(),
                    user.username.as_str(),
                    user.email.as_str(),
                    user.full_name.as_str(),
                    user.bio.as_str(),
                    text_or_null(user.profile_image_url.as_deref()),
                    user.followers_count,
                    user.following_count,
                    user.posts_count,
                    flag(user.is_private),
                    json_text(&user.followers)?,
                    json_text(&user.following)?,
                    user.created_at,
                    now_millis()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_many(&self, users: &[User]) -> Result<()> {
        for user in users {
            self.upsert(user).await?;
        }
        Ok(())
    }

    pub async fn get(&self, id: &UserId) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Case-insensitive username prefix search
    pub async fn search_by_username(&self, prefix: &str, limit: usize) -> Result<Vec<User>> {
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users
                     WHERE username LIKE ? ESCAPE '\\'
                     ORDER BY username ASC
                     LIMIT ?"
                ),
                params![pattern, to_i64(limit)],
            )
            .await?;

        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(Self::parse_user(&row)?);
        }
        Ok(users)
    }

    /// Adjust denormalized counters without touching other fields
    pub async fn adjust_counts(
        &self,
        id: &UserId,
        followers_delta: i64,
        following_delta: i64,
        posts_delta: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET
                    followers_count = MAX(followers_count + ?, 0),
                    following_count = MAX(following_count + ?, 0),
                    posts_count = MAX(posts_count + ?, 0)
                 WHERE id = ?",
                params![followers_delta, following_delta, posts_delta, id.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &UserId) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?", params![id.as_str()])
            .await?;
        Ok(())
    }

    fn parse_user(row: &Row) -> Result<User> {
        let id: String = row.get(0)?;
        Ok(User {
            id: UserId::new(id),
            username: row.get(1)?,
            email: row.get(2)?,
            full_name: row.get(3)?,
            bio: row.get(4)?,
            profile_image_url: opt_text(row, 5)?,
            followers_count: row.get(6)?,
            following_count: row.get(7)?,
            posts_count: row.get(8)?,
            is_private: get_flag(row, 9)?,
            followers: get_json_list(row, 10)?,
            following: get_json_list(row, 11)?,
            created_at: row.get(12)?,
        })
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn user(id: &str, username: &str) -> User {
        User::new(UserId::new(id), username, &format!("{username}@example.com"), "")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_and_get_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = UserDao::new(db.connection());

        let mut alice = user("u1", "alice");
        alice.followers = vec![UserId::new("u2")];
        alice.profile_image_url = Some("https://cdn/a.jpg".to_string());
        dao.upsert(&alice).await.unwrap();

        let fetched = dao.get(&alice.id).await.unwrap().unwrap();
        assert_eq!(fetched, alice);
        assert!(dao.get(&UserId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_matches_prefix_literally() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = UserDao::new(db.connection());
        dao.upsert_many(&[
            user("u1", "alice"),
            user("u2", "alina"),
            user("u3", "bob"),
            user("u4", "al_x"),
        ])
        .await
        .unwrap();

        let names: Vec<String> = dao
            .search_by_username("Ali", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "alina"]);

        let names: Vec<String> = dao
            .search_by_username("al_", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["al_x"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn adjust_counts_clamps_at_zero() {
        let db = Database::open_in_memory().await.unwrap();
        let dao = UserDao::new(db.connection());
        let alice = user("u1", "alice");
        dao.upsert(&alice).await.unwrap();

        dao.adjust_counts(&alice.id, 1, -1, 2).await.unwrap();
        let fetched = dao.get(&alice.id).await.unwrap().unwrap();
        assert_eq!(fetched.followers_count, 1);
        assert_eq!(fetched.following_count, 0);
        assert_eq!(fetched.posts_count, 2);
    }
}
