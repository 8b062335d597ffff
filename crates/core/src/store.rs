//! Persistence strategies for the ownership record.
//!
//! [`MemoryStore`] keeps the record for the lifetime of the process;
//! [`FileStore`] mirrors it to a single JSON file that is replaced
//! atomically (write to a sibling temp file, then rename) on every save.
//! Callers serialize access themselves; stores do no locking of their own
//! beyond what `&self` requires.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ownership::OwnershipRecord;

/// Errors from reading or writing a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed status file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the current record. `Ok(None)` means nothing has been stored.
    async fn load(&self) -> Result<Option<OwnershipRecord>, StoreError>;

    /// Replace the stored record wholesale.
    async fn save(&self, record: &OwnershipRecord) -> Result<(), StoreError>;

    /// Short human-readable description used in log lines.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Record held purely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<OwnershipRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `record`.
    pub fn with_record(record: OwnershipRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self) -> Result<Option<OwnershipRecord>, StoreError> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        *self.record.lock().await = Some(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// Record mirrored to a JSON file on disk.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "status.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn load(&self) -> Result<Option<OwnershipRecord>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let record: OwnershipRecord =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(record.normalized()))
    }

    async fn save(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
