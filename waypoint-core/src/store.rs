//! Task persistence: an explicit load/save interface and a JSON file store.
//!
//! The file store rewrites the whole document on every save (temp file +
//! rename). Two writers racing on the same file are caught by the revision
//! check instead of silently overwriting each other.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::task::TaskBook;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid task file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not serialize task book: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("task file changed since it was loaded (expected revision {expected}, found {found}); reload and retry")]
    StaleRevision { expected: u64, found: u64 },
}

pub trait TaskStore {
    fn load(&self) -> Result<TaskBook, StoreError>;

    /// Persist `book` and bump its revision.
    fn save(&self, book: &mut TaskBook) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

#[derive(Deserialize)]
struct RevisionOnly {
    #[serde(default)]
    revision: u64,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|source| self.io_err(source))
    }

    fn disk_revision(&self) -> Result<u64, StoreError> {
        match self.read()? {
            None => Ok(0),
            Some(s) => serde_json::from_str::<RevisionOnly>(&s)
                .map(|r| r.revision)
                .map_err(|source| StoreError::Parse {
                    path: self.path.clone(),
                    source,
                }),
        }
    }

    fn write_atomic(&self, data: &str) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| self.io_err(source))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let written = fs::File::create(&tmp)
            .and_then(|mut f| f.write_all(data.as_bytes()).and_then(|_| f.flush()))
            .and_then(|_| fs::rename(&tmp, &self.path));
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_err(source));
        }
        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TaskStore for JsonFileStore {
    fn load(&self) -> Result<TaskBook, StoreError> {
        let Some(s) = self.read()? else {
            debug!(path = %self.path.display(), "load: no task file yet");
            return Ok(TaskBook::default());
        };
        serde_json::from_str(&s).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, book: &mut TaskBook) -> Result<(), StoreError> {
        let found = self.disk_revision()?;
        if found != book.revision {
            return Err(StoreError::StaleRevision {
                expected: book.revision,
                found,
            });
        }

        book.revision += 1;
        let written = serde_json::to_string_pretty(book)
            .map_err(|source| StoreError::Serialize { source })
            .and_then(|data| self.write_atomic(&data));
        if let Err(e) = written {
            book.revision -= 1;
            return Err(e);
        }

        info!(
            path = %self.path.display(),
            revision = book.revision,
            tasks = book.tasks.len(),
            "save: wrote tasks"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));
        let book = store.load().unwrap();
        assert!(book.tasks.is_empty());
        assert_eq!(book.revision, 0);
    }

    #[test]
    fn test_save_bumps_revision_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("tasks.json"));
        let mut book = store.load().unwrap();
        store.save(&mut book).unwrap();
        assert_eq!(book.revision, 1);
        store.save(&mut book).unwrap();
        assert_eq!(store.load().unwrap().revision, 2);
        assert!(!dir.path().join("nested").join("tasks.json.tmp").exists());
    }

    #[test]
    fn test_stale_writer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tasks.json"));

        let mut first = store.load().unwrap();
        let mut second = store.load().unwrap();
        store.save(&mut first).unwrap();

        let err = store.save(&mut second).unwrap_err();
        assert!(matches!(err, StoreError::StaleRevision { expected: 0, found: 1 }));
        assert_eq!(second.revision, 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the task file should be makes the rename fail.
        let path = dir.path().join("tasks.json");
        fs::create_dir(&path).unwrap();
        let store = JsonFileStore::new(&path);

        let err = store.write_atomic("{}").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!dir.path().join("tasks.json.tmp").exists());
    }

    #[test]
    fn test_serialize_error_message() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let msg = StoreError::Serialize { source }.to_string();
        assert!(msg.starts_with("could not serialize task book"));
        assert!(!msg.contains("invalid task file"));
    }
}
