//! Shared handle to the local cache used by every repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::Database;
use crate::Result;

/// Thread-safe handle to the local cache database.
#[derive(Clone)]
pub struct LocalCache {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalCache {
    /// Open the cache at the given filesystem path.
    ///
    /// A file that is not a valid database is moved aside and a fresh cache
    /// is created; the remote store remains the source of truth.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local cache at {} is unreadable ({}); starting with an empty cache",
                    db_path.display(),
                    error
                );
                quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory cache (primarily for tests and demo mode).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Lock the database for a sequence of DAO calls.
    pub async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Drop all cached rows, e.g. on sign-out.
    pub async fn clear_all(&self) -> Result<()> {
        let db = self.lock().await;
        let tx = db.connection().transaction().await?;
        for table in ["users", "posts", "comments", "notifications", "categories"] {
            tx.execute(&format!("DELETE FROM {table}"), ()).await?;
        }
        tx.commit().await?;
        tracing::debug!("Cleared local cache");
        Ok(())
    }
}

fn is_corrupted_db_error(error: &crate::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("file is not a database") || message.contains("database disk image is malformed")
}

fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
    if db_path.exists() {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let file_name = db_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("cache.db");
        let backup_path = db_path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));

        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted cache file from {} to {}",
            db_path.display(),
            backup_path.display()
        );
    }

    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
        return Ok(());
    };
    // WAL and shared-memory sidecars
    let sidecar_prefix = format!("{base_name}-");

    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(&sidecar_prefix) {
            std::fs::remove_file(entry.path())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserDao;
    use crate::models::{User, UserId};
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_all_empties_tables() {
        let cache = LocalCache::open_in_memory().await.unwrap();
        let user = User::new(UserId::new("u1"), "alice", "a@example.com", "");
        {
            let db = cache.lock().await;
            UserDao::new(db.connection()).upsert(&user).await.unwrap();
        }

        cache.clear_all().await.unwrap();

        let db = cache.lock().await;
        assert!(UserDao::new(db.connection()).get(&user.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_recovers_from_garbage_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("cache.db");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![b'x'; 8192]).unwrap();

        let cache = LocalCache::open_path(&path).await.unwrap();
        assert_eq!(cache.path(), Some(path.as_path()));

        let backups = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn detects_corruption_messages() {
        assert!(is_corrupted_db_error(&crate::Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!is_corrupted_db_error(&crate::Error::InvalidInput(
            "nope".to_string()
        )));
    }
}
