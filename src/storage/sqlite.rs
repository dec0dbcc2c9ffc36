//! SQLite snapshot store

use super::{SnapshotStore, StoredSnapshot};
use crate::config::StorageSettings;
use crate::{IndexerError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-backed [`SnapshotStore`]
///
/// Holds separate writer and reader connections so API reads never queue
/// behind a sync write. With WAL enabled, readers see the last committed row.
pub struct SqliteSnapshotStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteSnapshotStore {
    /// Open or create the snapshot database
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        if let Some(parent) = settings.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %settings.path.display(), "Opening snapshot database");

        let writer = Self::open_connection(&settings.path, settings.wal_mode)?;
        writer.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                netuid INTEGER PRIMARY KEY,
                payload TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        let reader = Self::open_connection(&settings.path, settings.wal_mode)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path: settings.path.clone(),
        })
    }

    /// Open the database at `path` with WAL enabled
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(&StorageSettings {
            path: path.into(),
            wal_mode: true,
        })
    }

    fn open_connection(path: &Path, wal_mode: bool) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        if wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        Ok(conn)
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| IndexerError::Other("snapshot store connection poisoned".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn upsert_latest(&self, netuid: u16, payload: &str, version: i64) -> Result<i64> {
        let conn = Self::lock(&self.writer)?;
        let now = Utc::now().to_rfc3339();

        let stored: i64 = conn
            .query_row(
                r#"
                INSERT INTO snapshots (netuid, payload, version, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(netuid) DO UPDATE SET
                    payload = excluded.payload,
                    version = MAX(excluded.version, snapshots.version + 1),
                    updated_at = excluded.updated_at
                RETURNING version
                "#,
                params![netuid, payload, version, now],
                |row| row.get(0),
            )
            .map_err(|e| {
                IndexerError::StoreWriteFailure(format!("netuid {}: {}", netuid, e))
            })?;

        tracing::debug!(netuid, version = stored, bytes = payload.len(), "Snapshot stored");
        Ok(stored)
    }

    fn get_latest(&self, netuid: u16) -> Result<StoredSnapshot> {
        let conn = Self::lock(&self.reader)?;

        let row: Option<(String, i64, String)> = conn
            .query_row(
                "SELECT payload, version, updated_at FROM snapshots WHERE netuid = ?1",
                params![netuid],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (payload, version, updated_at) = row.ok_or_else(|| {
            IndexerError::NotFound(format!("no snapshot stored for netuid {}", netuid))
        })?;

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| IndexerError::Other(format!("Corrupt snapshot timestamp: {}", e)))?;

        Ok(StoredSnapshot {
            netuid,
            payload,
            version,
            updated_at,
        })
    }

    fn partitions(&self) -> Result<Vec<u16>> {
        let conn = Self::lock(&self.reader)?;
        let mut stmt = conn.prepare("SELECT netuid FROM snapshots ORDER BY netuid")?;
        let netuids = stmt
            .query_map([], |row| row.get::<_, u16>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(netuids)
    }
}
