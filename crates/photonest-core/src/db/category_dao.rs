//! Cached categories

use libsql::{params, Connection};

use super::row::to_i64;
use crate::error::Result;
use crate::models::Category;

/// DAO for the `categories` table
pub struct CategoryDao<'a> {
    conn: &'a Connection,
}

impl<'a> CategoryDao<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn upsert_many(&self, categories: &[Category]) -> Result<()> {
        for category in categories {
            self.conn
                .execute(
                    "INSERT OR REPLACE INTO categories (name, post_count, last_used_at) VALUES (?, ?, ?)",
                    params![category.name.as_str(), category.post_count, category.last_used_at],
                )
                .await?;
        }
        Ok(())
    }

    /// Categories by popularity
    pub async fn list_popular(&self, limit: usize) -> Result<Vec<Category>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, post_count, last_used_at FROM categories
                 WHERE post_count > 0
                 ORDER BY post_count DESC, last_used_at DESC, name ASC
                 LIMIT ?",
                params![to_i64(limit)],
            )
            .await?;

        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            categories.push(Category {
                name: row.get(0)?,
                post_count: row.get(1)?,
                last_used_at: row.get(2)?,
            });
        }
        Ok(categories)
    }

    /// Adjust a category's post count, creating the row on first use
    pub async fn adjust_count(&self, name: &str, delta: i64, used_at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO categories (name, post_count, last_used_at) VALUES (?1, MAX(?2, 0), ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    post_count = MAX(categories.post_count + ?2, 0),
                    last_used_at = MAX(categories.last_used_at, ?3)",
                params![name, delta, used_at],
            )
            .await?;
        Ok(())
    }
}
