//! Persistent principal storage using fjall

use fjall::{Config, Keyspace, PersistMode};
use std::path::Path;
use std::sync::{Arc, Mutex};
use webblog_core::*;

pub mod principals;

pub use principals::*;

/// Storage engine wrapping a fjall keyspace
#[derive(Clone)]
pub struct StorageEngine {
    keyspace: Arc<Keyspace>,
    write_lock: Arc<Mutex<()>>,
}

impl StorageEngine {
    /// Open or create a storage engine at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::new(path);
        let keyspace = Arc::new(
            config
                .open()
                .map_err(|e| WebblogError::Storage(e.to_string()))?,
        );

        Ok(StorageEngine {
            keyspace,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create temporary storage engine for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir().map_err(|e| WebblogError::Internal(e.to_string()))?;
        let engine = Self::new(temp_dir.path())?;
        Ok((engine, temp_dir))
    }

    /// Open the principal store partitions
    pub fn principals(&self) -> Result<PrincipalStore> {
        PrincipalStore::open(self.clone())
    }

    pub(crate) fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Serializes check-then-write sequences. Reads never take it.
    pub(crate) fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }

    /// Persist all changes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| WebblogError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_engine_creation() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        assert!(engine.persist().is_ok());
    }

    #[test]
    fn test_principal_store_opens() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let store = engine.principals().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}
