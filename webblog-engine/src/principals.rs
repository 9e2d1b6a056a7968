//! Principal records over fjall partitions

use crate::StorageEngine;
use fjall::{Partition, PartitionCreateOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webblog_core::auth::{ensure_identifiers_available, PrincipalResolver};
use webblog_core::*;

const PRINCIPALS_PARTITION: &str = "principals";
const LOGIN_INDEX_PARTITION: &str = "login_index";

/// Principal records keyed by subject, plus an alternate-identifier index.
///
/// A subject or alternate identifier is unique across both partitions, so a
/// login identifier resolves to at most one principal.
#[derive(Clone)]
pub struct PrincipalStore {
    principals: Arc<Partition>,
    login_index: Arc<Partition>,
    engine: StorageEngine,
}

impl PrincipalStore {
    pub(crate) fn open(engine: StorageEngine) -> Result<Self> {
        let principals = Arc::new(
            engine
                .keyspace()
                .open_partition(PRINCIPALS_PARTITION, PartitionCreateOptions::default())
                .map_err(|e| WebblogError::Storage(e.to_string()))?,
        );

        let login_index = Arc::new(
            engine
                .keyspace()
                .open_partition(LOGIN_INDEX_PARTITION, PartitionCreateOptions::default())
                .map_err(|e| WebblogError::Storage(e.to_string()))?,
        );

        Ok(PrincipalStore {
            principals,
            login_index,
            engine,
        })
    }

    /// Store a new principal.
    ///
    /// Fails with `DuplicateIdentifier` if any of its identifiers is already
    /// some principal's subject or alternate identifier.
    pub fn register(&self, principal: &Principal) -> Result<()> {
        let _guard = self
            .engine
            .write_lock()
            .lock()
            .map_err(|_| WebblogError::Internal("write lock poisoned".to_string()))?;

        ensure_identifiers_available(principal, |identifier| self.is_taken(identifier))?;

        let record = serde_json::to_vec(principal).map_err(WebblogError::Serialization)?;
        let subject = principal.subject.as_str();

        let mut batch = self.engine.keyspace().batch();
        batch.insert(&self.principals, subject, record);
        for alternate in &principal.alternate_identifiers {
            batch.insert(&self.login_index, alternate.as_str(), subject);
        }
        batch
            .commit()
            .map_err(|e| WebblogError::Storage(e.to_string()))?;

        self.engine.persist()?;

        info!(
            "Registered principal '{}' with {} alternate identifier(s)",
            subject,
            principal.alternate_identifiers.len()
        );
        Ok(())
    }

    /// Delete a principal and its index entries. Returns whether it existed.
    pub fn remove(&self, subject: &SubjectId) -> Result<bool> {
        let _guard = self
            .engine
            .write_lock()
            .lock()
            .map_err(|_| WebblogError::Internal("write lock poisoned".to_string()))?;

        let Some(principal) = self.get(subject)? else {
            return Ok(false);
        };

        let mut batch = self.engine.keyspace().batch();
        batch.remove(&self.principals, subject.as_str());
        for alternate in &principal.alternate_identifiers {
            batch.remove(&self.login_index, alternate.as_str());
        }
        batch
            .commit()
            .map_err(|e| WebblogError::Storage(e.to_string()))?;

        self.engine.persist()?;

        info!("Removed principal '{}'", subject);
        Ok(true)
    }

    /// Look up by subject only
    pub fn get(&self, subject: &SubjectId) -> Result<Option<Principal>> {
        self.get_record(subject.as_str())
    }

    /// Number of stored principals
    pub fn count(&self) -> Result<usize> {
        self.principals
            .len()
            .map_err(|e| WebblogError::Storage(e.to_string()))
    }

    fn get_record(&self, subject: &str) -> Result<Option<Principal>> {
        match self.principals.get(subject) {
            Ok(Some(data)) => {
                let principal: Principal =
                    serde_json::from_slice(&data).map_err(WebblogError::Serialization)?;
                Ok(Some(principal))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(WebblogError::Storage(e.to_string())),
        }
    }

    fn is_taken(&self, identifier: &str) -> Result<bool> {
        let as_subject = self
            .principals
            .contains_key(identifier)
            .map_err(|e| WebblogError::Storage(e.to_string()))?;
        let as_alternate = self
            .login_index
            .contains_key(identifier)
            .map_err(|e| WebblogError::Storage(e.to_string()))?;
        Ok(as_subject || as_alternate)
    }
}

impl PrincipalResolver for PrincipalStore {
    fn resolve_by_login_identifier(&self, identifier: &str) -> Result<Option<Principal>> {
        if let Some(principal) = self.get_record(identifier)? {
            return Ok(Some(principal));
        }

        let subject = match self.login_index.get(identifier) {
            Ok(Some(subject)) => subject,
            Ok(None) => {
                debug!("No principal for login identifier '{}'", identifier);
                return Ok(None);
            }
            Err(e) => return Err(WebblogError::Storage(e.to_string())),
        };

        let subject = std::str::from_utf8(&subject)
            .map_err(|e| WebblogError::Storage(format!("corrupt login index entry: {}", e)))?;

        let principal = self.get_record(subject)?;
        if principal.is_none() {
            warn!(
                "Login index entry '{}' points at missing principal '{}'",
                identifier, subject
            );
        }
        Ok(principal)
    }
}
