//! Cursor persistence across restarts.
//!
//! The cursor is the sequence id of the last fully processed event, stored
//! as a decimal string in a single plain-text file that is overwritten after
//! each non-empty batch. The two directions have deliberately different
//! failure behavior: absence of usable state on load means "start from now",
//! while a failed save propagates — a dropped write would cause unbounded
//! re-delivery drift on the next restart.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File-backed store for the last processed event sequence id.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the cursor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted cursor.
    ///
    /// A missing file, an unreadable file, or unparsable contents all yield
    /// `None`: polling then starts from the current time.
    pub fn load(&self) -> Option<u64> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    "failed to read cursor file {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match data.trim().parse::<u64>() {
            Ok(sequence_id) => Some(sequence_id),
            Err(_) => {
                tracing::warn!(
                    "cursor file {} does not hold a sequence id, starting fresh",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Overwrite the stored cursor with `sequence_id`.
    pub fn save(&self, sequence_id: u64) -> Result<()> {
        fs::write(&self.path, sequence_id.to_string()).map_err(|source| Error::CursorSave {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = CursorStore::new(tmp.path().join("cursor.state"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = CursorStore::new(tmp.path().join("cursor.state"));

        store.save(12345).unwrap();
        assert_eq!(store.load(), Some(12345));

        // Overwrite, not append.
        store.save(12346).unwrap();
        assert_eq!(store.load(), Some(12346));
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "12346");
    }

    #[test]
    fn corrupt_contents_load_as_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursor.state");
        std::fs::write(&path, "not-a-number").unwrap();

        let store = CursorStore::new(path);
        assert_eq!(store.load(), None);
    }

    #[test]
    fn trailing_whitespace_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursor.state");
        std::fs::write(&path, "42\n").unwrap();

        let store = CursorStore::new(path);
        assert_eq!(store.load(), Some(42));
    }

    #[test]
    fn save_into_missing_directory_fails_loudly() {
        let tmp = TempDir::new().unwrap();
        let store = CursorStore::new(tmp.path().join("no-such-dir").join("cursor.state"));

        let err = store.save(1).unwrap_err();
        assert!(matches!(err, Error::CursorSave { .. }));
    }
}
