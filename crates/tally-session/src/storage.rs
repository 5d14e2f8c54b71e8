//! Persistence of the credential between application runs.
//!
//! One record, under one fixed key. The store writes it on every
//! successful login/refresh and deletes it on logout or when it is found
//! expired. The byte format belongs to the codec; the location belongs to
//! the [`Storage`] backend.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tally_api::{Codec, JsonCodec, Principal, Timestamp};

/// The storage key the credential record lives under.
pub const CREDENTIAL_KEY: &str = "tally.session";

/// Errors from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("record could not be encoded: {0}")]
    Encode(String),
}

/// A small key/value store for persisted client state.
pub trait Storage: Send + Sync + 'static {
    /// Returns the bytes stored under `key`, or `None` if nothing is.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `bytes` under `key`, replacing any previous value.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Deletes `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Keeps values for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves a half-written record.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialRecord / CredentialStore
// ---------------------------------------------------------------------------

/// The persisted credential: enough to resume a session after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: Timestamp,
    pub principal: Principal,
}

/// Reads and writes the [`CredentialRecord`] through a codec.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
    codec: JsonCodec,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            codec: JsonCodec,
        }
    }

    /// Loads the stored record.
    ///
    /// A record that no longer decodes is deleted and reported as absent:
    /// the user simply logs in again.
    pub fn load(&self) -> Result<Option<CredentialRecord>, StorageError> {
        let Some(bytes) = self.storage.load(CREDENTIAL_KEY)? else {
            return Ok(None);
        };
        match self.codec.decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable credential record");
                self.storage.remove(CREDENTIAL_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn persist(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        let bytes = self
            .codec
            .encode(record)
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        self.storage.save(CREDENTIAL_KEY, &bytes)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(CREDENTIAL_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_api::PrincipalId;

    fn record() -> CredentialRecord {
        CredentialRecord {
            token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Timestamp(42_000),
            principal: Principal::new(PrincipalId(7), "ana@example.com"),
        }
    }

    #[test]
    fn test_persist_then_load_returns_identical_record() {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));

        store.persist(&record()).unwrap();

        assert_eq!(store.load().unwrap(), Some(record()));
    }

    #[test]
    fn test_load_without_record_returns_none() {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_load_corrupt_record_removes_it() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(CREDENTIAL_KEY, b"{\"token\": 1").unwrap();
        let store = CredentialStore::new(storage.clone());

        assert_eq!(store.load().unwrap(), None);
        assert_eq!(storage.load(CREDENTIAL_KEY).unwrap(), None);
    }

    #[test]
    fn test_clear_removes_record() {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        store.persist(&record()).unwrap();

        store.clear().unwrap();

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_storage_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let first = CredentialStore::new(Arc::new(FileStorage::new(dir.path())));
        first.persist(&record()).unwrap();

        let second = CredentialStore::new(Arc::new(FileStorage::new(dir.path())));

        assert_eq!(second.load().unwrap(), Some(record()));
        assert!(dir.path().join("tally.session.json").exists());
    }

    #[test]
    fn test_file_storage_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert!(storage.remove(CREDENTIAL_KEY).is_ok());
        assert_eq!(storage.load(CREDENTIAL_KEY).unwrap(), None);
    }
}
