//! Versioned schema for the local cache.
//!
//! Each step runs in its own transaction and records its version in
//! `schema_version`, so a crash mid-upgrade leaves the cache at the last
//! complete step.

use crate::error::Result;
use libsql::Connection;

/// Ordered schema steps; a step's version is its position plus one.
const STEPS: &[&[&str]] = &[USERS_POSTS_COMMENTS, NOTIFICATIONS_CATEGORIES];

/// Bring the cache schema up to date.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let applied = current_version(conn).await?;
    for (version, statements) in (1..).zip(STEPS.iter()) {
        if version > applied {
            apply_step(conn, version, statements).await?;
        }
    }
    Ok(())
}

fn latest_version() -> i64 {
    i64::try_from(STEPS.len()).unwrap_or(i64::MAX)
}

async fn current_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Ok(0),
    }
}

const USERS_POSTS_COMMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        full_name TEXT NOT NULL DEFAULT '',
        bio TEXT NOT NULL DEFAULT '',
        profile_image_url TEXT,
        followers_count INTEGER NOT NULL DEFAULT 0,
        following_count INTEGER NOT NULL DEFAULT 0,
        posts_count INTEGER NOT NULL DEFAULT 0,
        is_private INTEGER NOT NULL DEFAULT 0,
        followers TEXT NOT NULL DEFAULT '[]',
        following TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        cached_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
    "CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        username TEXT NOT NULL,
        user_profile_image_url TEXT,
        image_url TEXT NOT NULL,
        image_key TEXT NOT NULL DEFAULT '',
        caption TEXT NOT NULL DEFAULT '',
        category TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        likes_count INTEGER NOT NULL DEFAULT 0,
        comments_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        is_liked INTEGER NOT NULL DEFAULT 0,
        is_bookmarked INTEGER NOT NULL DEFAULT 0,
        in_feed INTEGER NOT NULL DEFAULT 0,
        cached_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_category ON posts(category, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        username TEXT NOT NULL,
        user_profile_image_url TEXT,
        text TEXT NOT NULL,
        parent_id TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)",
];

const NOTIFICATIONS_CATEGORIES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        recipient_id TEXT NOT NULL,
        actor_id TEXT NOT NULL,
        actor_username TEXT NOT NULL,
        actor_profile_image_url TEXT,
        kind TEXT NOT NULL,
        post_id TEXT,
        message TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient_id, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS categories (
        name TEXT PRIMARY KEY,
        post_count INTEGER NOT NULL DEFAULT 0,
        last_used_at INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_categories_count ON categories(post_count DESC)",
];

async fn apply_step(conn: &Connection, version: i64, statements: &[&str]) -> Result<()> {
    let tx = conn.transaction().await?;
    for statement in statements {
        tx.execute(statement, ()).await?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        libsql::params![version],
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        "Local cache schema at version {version} of {}",
        latest_version()
    );
    Ok(())
}
