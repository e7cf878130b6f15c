//! File-backed store for `SessionMemory`

use super::types::SessionMemory;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Loads and saves the remembered course
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    /// Create a store backed by `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the remembered course
    ///
    /// A missing file is `None`. An unreadable or corrupt file is logged and
    /// also treated as `None`, since the memory is only a convenience.
    pub fn load(&self) -> Option<SessionMemory> {
        match self.try_load() {
            Ok(memory) => memory,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring last-session file");
                None
            }
        }
    }

    /// Load the remembered course, reporting read and parse failures
    pub fn try_load(&self) -> Result<Option<SessionMemory>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| Error::State {
            message: format!("Failed to read last-session file: {e}"),
        })?;
        let memory = serde_json::from_str(&contents).map_err(|e| Error::State {
            message: format!("Failed to parse last-session file: {e}"),
        })?;
        Ok(Some(memory))
    }

    /// Save the remembered course
    pub async fn save(&self, memory: &SessionMemory) -> Result<()> {
        let contents = serde_json::to_string_pretty(memory).map_err(|e| Error::State {
            message: format!("Failed to serialize last session: {e}"),
        })?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to write last-session file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to rename last-session file: {e}"),
            })?;

        debug!(course = %memory.course_id, "Remembered course");
        Ok(())
    }

    /// Forget the remembered course
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::State {
                message: format!("Failed to remove last-session file: {e}"),
            }),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
