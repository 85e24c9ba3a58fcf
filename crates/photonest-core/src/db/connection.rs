//! libSQL connection for the local cache

use std::path::Path;

use libsql::{Builder, Connection};

use super::migrations;
use crate::error::Result;

const IN_MEMORY: &str = ":memory:";

/// Open libSQL database plus its single connection.
pub struct Database {
    _handle: libsql::Database,
    conn: Connection,
}

impl Database {
    /// Open or create the cache file at `path` and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::at(&path.as_ref().to_string_lossy()).await
    }

    /// Throwaway cache for tests and the memory backend.
    pub async fn open_in_memory() -> Result<Self> {
        Self::at(IN_MEMORY).await
    }

    async fn at(location: &str) -> Result<Self> {
        let handle = Builder::new_local(location).build().await?;
        let conn = handle.connect()?;
        tune(&conn, location == IN_MEMORY).await?;
        migrations::run(&conn).await?;
        Ok(Self {
            _handle: handle,
            conn,
        })
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

async fn tune(conn: &Connection, in_memory: bool) -> Result<()> {
    if !in_memory {
        // journal_mode answers with a row, so it has to go through query
        conn.query("PRAGMA journal_mode = WAL", ()).await?;
        conn.execute("PRAGMA synchronous = NORMAL", ()).await?;
    }
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;
    Ok(())
}
