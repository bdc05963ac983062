//! SQLite state store: one row per snapshot key, payload stored as JSON.

use crate::domain::error::TicktraderError;
use crate::domain::snapshot::{LoadedState, StateSnapshot};
use crate::ports::state_store_port::StateStorePort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

pub struct SqliteStateStore {
    pool: Pool<SqliteConnectionManager>,
}

fn storage(e: impl std::fmt::Display) -> TicktraderError {
    TicktraderError::Storage {
        reason: e.to_string(),
    }
}

impl SqliteStateStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TicktraderError> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(|e: r2d2::Error| storage(e))?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, TicktraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| storage(e))?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TicktraderError> {
        self.pool.get().map_err(|e: r2d2::Error| storage(e))
    }

    fn initialize_schema(&self) -> Result<(), TicktraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS state_snapshots (
                    key TEXT PRIMARY KEY,
                    last_tick_id INTEGER NOT NULL,
                    saved_at TEXT NOT NULL,
                    payload TEXT NOT NULL
                );",
            )
            .map_err(|e: rusqlite::Error| storage(e))
    }

    pub fn read_snapshot(&self, key: &str) -> Result<Option<StateSnapshot>, TicktraderError> {
        let payload: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM state_snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e: rusqlite::Error| storage(e))?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(storage))
            .transpose()
    }
}

impl StateStorePort for SqliteStateStore {
    fn load(&self, key: &str) -> Result<LoadedState, TicktraderError> {
        Ok(self
            .read_snapshot(key)?
            .map(LoadedState::from)
            .unwrap_or_default())
    }

    fn save(&mut self, key: &str, snapshot: &StateSnapshot) -> Result<(), TicktraderError> {
        let payload = serde_json::to_string(snapshot).map_err(storage)?;
        let last_tick_id = i64::try_from(snapshot.last_tick_id).map_err(storage)?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO state_snapshots (key, last_tick_id, saved_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, last_tick_id, snapshot.saved_at.to_rfc3339(), payload],
            )
            .map_err(|e: rusqlite::Error| storage(e))?;
        Ok(())
    }
}
