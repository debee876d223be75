use crate::fingerprint::{Fingerprint, FingerprintKey, KeyScope, SyncParams};
use crate::outcome::FailureKind;
use crate::storage::{RecordSet, Storage, StorageError, UnitTransaction};

/// Errors reported by a remote fetch adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The remote source confirms the resource does not exist for these
    /// parameters.
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Errors that make every remaining unit of a batch pointless.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Errors raised while turning a remote payload into storable records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("duplicate record id: {0}")]
    Duplicate(String),
}

impl ConvertError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

/// Everything that can go wrong while syncing a single unit.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UnitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch(FetchError::Unauthorized(_)) => FailureKind::Unauthorized,
            Self::Fetch(FetchError::Malformed(_)) => FailureKind::Parse,
            Self::Fetch(_) => FailureKind::Network,
            Self::Convert(_) => FailureKind::Parse,
            Self::Storage(_) => FailureKind::Storage,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_unavailable())
    }

    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_batch_fatal())
    }
}

/// One independently hashed, independently fetched remote resource.
///
/// `fetch_fingerprint` must be cheap and must change whenever the payload
/// returned by `fetch_payload` would change. `persist` replaces the unit's
/// records rather than appending to them.
#[async_trait::async_trait]
pub trait SyncUnit<P: SyncParams>: Send + Sync {
    type Remote: Send;
    type Local: Send;

    /// Stable resource name, e.g. `dishes`.
    fn resource(&self) -> &str;

    /// Parameter dimensions the fingerprint and records are keyed by.
    fn scope(&self) -> KeyScope;

    fn record_set(&self, params: &P) -> RecordSet {
        RecordSet::new(
            SyncUnit::<P>::resource(self),
            SyncUnit::<P>::scope(self).discriminator(params),
        )
    }

    async fn fetch_fingerprint(&self, params: &P) -> Result<Fingerprint, FetchError>;

    async fn fetch_payload(&self, params: &P) -> Result<Self::Remote, FetchError>;

    fn convert(&self, params: &P, remote: Self::Remote) -> Result<Self::Local, ConvertError>;

    fn persist(
        &self,
        params: &P,
        local: Self::Local,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError>;

    /// Drop every record of this unit. Called when the remote source reports
    /// the resource as unavailable.
    fn clear(&self, params: &P, tx: &mut dyn UnitTransaction) -> Result<(), StorageError> {
        tx.replace_records(&SyncUnit::<P>::record_set(self, params), &[])
    }
}

/// Object-safe view of a [`SyncUnit`], so a dataset can hold units with
/// different payload types side by side.
#[async_trait::async_trait]
pub trait DynSyncUnit<P: SyncParams>: Send + Sync {
    fn resource(&self) -> &str;

    fn fingerprint_key(&self, params: &P) -> FingerprintKey;

    fn record_set(&self, params: &P) -> RecordSet;

    async fn fetch_fingerprint(&self, params: &P) -> Result<Fingerprint, FetchError>;

    /// Fetch, convert, and persist the payload together with `fingerprint`
    /// in one transaction.
    async fn apply(
        &self,
        params: &P,
        fingerprint: &Fingerprint,
        storage: &dyn Storage,
    ) -> Result<(), UnitError>;

    /// Drop the unit's records and invalidate its fingerprint in one
    /// transaction.
    fn clear(&self, params: &P, storage: &dyn Storage) -> Result<(), StorageError>;
}

#[async_trait::async_trait]
impl<P, U> DynSyncUnit<P> for U
where
    P: SyncParams,
    U: SyncUnit<P>,
{
    fn resource(&self) -> &str {
        SyncUnit::<P>::resource(self)
    }

    fn fingerprint_key(&self, params: &P) -> FingerprintKey {
        FingerprintKey::new(
            SyncUnit::<P>::resource(self),
            SyncUnit::<P>::scope(self).discriminator(params),
        )
    }

    fn record_set(&self, params: &P) -> RecordSet {
        SyncUnit::<P>::record_set(self, params)
    }

    async fn fetch_fingerprint(&self, params: &P) -> Result<Fingerprint, FetchError> {
        SyncUnit::<P>::fetch_fingerprint(self, params).await
    }

    async fn apply(
        &self,
        params: &P,
        fingerprint: &Fingerprint,
        storage: &dyn Storage,
    ) -> Result<(), UnitError> {
        let remote = self.fetch_payload(params).await?;
        let local = self.convert(params, remote)?;
        let key = DynSyncUnit::fingerprint_key(self, params);

        storage.transact(Box::new(
            move |tx: &mut dyn UnitTransaction| -> Result<(), StorageError> {
                self.persist(params, local, tx)?;
                tx.set_fingerprint(&key, fingerprint)
            },
        ))?;

        Ok(())
    }

    fn clear(&self, params: &P, storage: &dyn Storage) -> Result<(), StorageError> {
        let key = DynSyncUnit::fingerprint_key(self, params);

        storage.transact(Box::new(
            move |tx: &mut dyn UnitTransaction| -> Result<(), StorageError> {
                SyncUnit::<P>::clear(self, params, tx)?;
                tx.set_fingerprint(&key, &Fingerprint::cleared())
            },
        ))
    }
}
