use crate::ledger::LedgerEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StoreError {
    /// The event store file or its directory could not be created or opened
    Open { path: PathBuf, reason: String },
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl StoreError {
    pub fn open(path: &Path, err: impl std::fmt::Display) -> Self {
        StoreError::Open {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Open { path, reason } => {
                write!(f, "Failed to open event store {}: {}", path.display(), reason)
            }
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// A ledger event stamped with the time the observer received it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub recorded_at: i64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

#[async_trait]
pub trait EventWriterBackend: Send {
    /// Write a single event record
    async fn write(&mut self, record: &EventRecord) -> Result<(), StoreError>;

    /// Flush pending writes to storage
    async fn flush(&mut self) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
