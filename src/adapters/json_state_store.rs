//! JSON file state store: one `<key>.json` file per snapshot key.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::TicktraderError;
use crate::domain::snapshot::{LoadedState, StateSnapshot};
use crate::ports::state_store_port::StateStorePort;

pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Bytes outside `[A-Za-z0-9-]` are written as `_XX` (hex), so distinct
    /// keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut stem = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("_{:02X}", byte));
            }
        }
        self.dir.join(format!("{}.json", stem))
    }

    pub fn read_snapshot(&self, key: &str) -> Result<Option<StateSnapshot>, TicktraderError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| TicktraderError::Storage {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let snapshot = serde_json::from_str(&content).map_err(|e| TicktraderError::Storage {
            reason: format!("corrupt snapshot {}: {}", path.display(), e),
        })?;
        Ok(Some(snapshot))
    }
}

impl StateStorePort for JsonStateStore {
    fn load(&self, key: &str) -> Result<LoadedState, TicktraderError> {
        Ok(self
            .read_snapshot(key)?
            .map(LoadedState::from)
            .unwrap_or_default())
    }

    fn save(&mut self, key: &str, snapshot: &StateSnapshot) -> Result<(), TicktraderError> {
        fs::create_dir_all(&self.dir).map_err(|e| TicktraderError::Storage {
            reason: format!("failed to create {}: {}", self.dir.display(), e),
        })?;
        let path = self.path_for(key);
        let body = serde_json::to_string_pretty(snapshot).map_err(|e| TicktraderError::Storage {
            reason: format!("failed to encode snapshot: {}", e),
        })?;

        // atomic replace
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| TicktraderError::Storage {
            reason: format!("failed to write {}: {}", tmp.display(), e),
        })?;
        fs::rename(&tmp, &path).map_err(|e| TicktraderError::Storage {
            reason: format!("failed to replace {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}
