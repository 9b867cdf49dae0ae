// Room persistence: the whole room table as one JSON file, written after
// mutations and loaded at startup. Rooms are never deleted from the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::room::state::Room;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write store file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse store file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// File-backed store for the room table.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Store { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted room table. A missing file is an empty table, not
    /// an error. Participants come back offline regardless of how they were
    /// saved; they become online again only by reconnecting.
    pub fn load(&self) -> Result<HashMap<String, Room>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| StoreError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        let mut rooms: HashMap<String, Room> =
            serde_json::from_str(&text).map_err(|e| StoreError::ParseError {
                path: self.path.clone(),
                source: e,
            })?;
        for room in rooms.values_mut() {
            for participant in room.participants.values_mut() {
                participant.is_online = false;
            }
        }
        info!("Loaded {} rooms from {}", rooms.len(), self.path.display());
        Ok(rooms)
    }

    /// Write the full table. Participants are saved offline so a reloaded
    /// table never claims live connections.
    pub fn save(&self, rooms: &HashMap<String, Room>) -> Result<(), StoreError> {
        let mut sanitized = rooms.clone();
        for room in sanitized.values_mut() {
            for participant in room.participants.values_mut() {
                participant.is_online = false;
            }
        }
        let text = serde_json::to_string_pretty(&sanitized).map_err(|e| StoreError::ParseError {
            path: self.path.clone(),
            source: e,
        })?;
        std::fs::write(&self.path, text).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Best-effort save: persistence failure is logged and never rolls back
    /// or aborts the in-memory mutation that triggered it.
    pub fn save_or_log(&self, rooms: &HashMap<String, Room>) {
        if let Err(e) = self.save(rooms) {
            warn!("Persistence write failed (state kept in memory): {e}");
        }
    }
}
