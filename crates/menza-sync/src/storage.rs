use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::fingerprint::{Fingerprint, FingerprintKey, FingerprintStore};

/// Errors raised by a storage adapter.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A collection of records owned by one resource under one discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordSet {
    pub collection: String,
    pub scope: String,
}

impl RecordSet {
    pub fn new(collection: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            scope: scope.into(),
        }
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.collection, self.scope)
    }
}

/// One persisted record: a stable id plus its JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    pub body: String,
}

impl StoredRecord {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    pub fn encode<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, StorageError> {
        let body =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self::new(id, body))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_str(&self.body).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Writes available inside one unit-scoped transaction.
pub trait UnitTransaction {
    /// Replace every record of `set` with `records`, keeping their order.
    fn replace_records(
        &mut self,
        set: &RecordSet,
        records: &[StoredRecord],
    ) -> Result<(), StorageError>;

    fn set_fingerprint(
        &mut self,
        key: &FingerprintKey,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError>;
}

/// Work executed inside [`Storage::transact`].
pub type TransactionWork<'a> =
    Box<dyn FnOnce(&mut dyn UnitTransaction) -> Result<(), StorageError> + 'a>;

/// Durable storage shared by records and fingerprints.
pub trait Storage: FingerprintStore {
    /// Run `work` in a transaction: commit when it returns `Ok`, roll back
    /// otherwise.
    fn transact(&self, work: TransactionWork<'_>) -> Result<(), StorageError>;
}
