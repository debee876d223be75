use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Clock;
use crate::fingerprint::{Fingerprint, FingerprintKey, FingerprintStore, KeyScope, SyncParams};
use crate::storage::{
    RecordSet, Storage, StorageError, StoredRecord, TransactionWork, UnitTransaction,
};
use crate::unit::{ConvertError, FetchError, SyncUnit};
use crate::validity::{ValidityKey, ValidityStore};

/// In-memory storage for testing. Transactions stage their writes and apply
/// them only when the work succeeds.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    fingerprints: HashMap<FingerprintKey, Fingerprint>,
    records: HashMap<RecordSet, Vec<StoredRecord>>,
    persists: HashMap<RecordSet, usize>,
    validity: HashMap<ValidityKey, DateTime<Utc>>,
    fail_fingerprint_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, set: &RecordSet) -> Vec<StoredRecord> {
        let state = self.state.lock().unwrap();
        state.records.get(set).cloned().unwrap_or_default()
    }

    pub fn record_ids(&self, set: &RecordSet) -> Vec<String> {
        self.records(set).into_iter().map(|r| r.id).collect()
    }

    /// Number of committed `replace_records` calls for `set`.
    pub fn persist_count(&self, set: &RecordSet) -> usize {
        let state = self.state.lock().unwrap();
        state.persists.get(set).copied().unwrap_or(0)
    }

    /// Make every fingerprint write inside a transaction fail.
    pub fn fail_fingerprint_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_fingerprint_writes = fail;
    }
}

impl FingerprintStore for MemoryStorage {
    fn fingerprint(&self, key: &FingerprintKey) -> Result<Option<Fingerprint>, StorageError> {
        Ok(self.state.lock().unwrap().fingerprints.get(key).cloned())
    }

    fn set_fingerprint(
        &self,
        key: &FingerprintKey,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError> {
        self.state
            .lock()
            .unwrap()
            .fingerprints
            .insert(key.clone(), fingerprint.clone());
        Ok(())
    }
}

struct StagedWrites {
    records: Vec<(RecordSet, Vec<StoredRecord>)>,
    fingerprints: Vec<(FingerprintKey, Fingerprint)>,
    fail_fingerprint_writes: bool,
}

impl UnitTransaction for StagedWrites {
    fn replace_records(
        &mut self,
        set: &RecordSet,
        records: &[StoredRecord],
    ) -> Result<(), StorageError> {
        self.records.push((set.clone(), records.to_vec()));
        Ok(())
    }

    fn set_fingerprint(
        &mut self,
        key: &FingerprintKey,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError> {
        if self.fail_fingerprint_writes {
            return Err(StorageError::Database("disk I/O error".into()));
        }
        self.fingerprints.push((key.clone(), fingerprint.clone()));
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn transact(&self, work: TransactionWork<'_>) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let mut staged = StagedWrites {
            records: Vec::new(),
            fingerprints: Vec::new(),
            fail_fingerprint_writes: state.fail_fingerprint_writes,
        };

        work(&mut staged)?;

        for (set, records) in staged.records {
            *state.persists.entry(set.clone()).or_default() += 1;
            state.records.insert(set, records);
        }
        for (key, fingerprint) in staged.fingerprints {
            state.fingerprints.insert(key, fingerprint);
        }
        Ok(())
    }
}

impl ValidityStore for MemoryStorage {
    fn last_confirmed(&self, key: &ValidityKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.state.lock().unwrap().validity.get(key).copied())
    }

    fn confirm(&self, key: &ValidityKey, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.validity.entry(key.clone()).or_insert(at);
        if *entry < at {
            *entry = at;
        }
        Ok(())
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Scriptable sync unit. Clones share state, so a test can keep a handle
/// while the dataset owns a boxed copy.
#[derive(Clone)]
pub struct StubUnit {
    resource: String,
    scope: KeyScope,
    state: Arc<Mutex<StubState>>,
}

struct StubState {
    fingerprint: String,
    ids: Vec<String>,
    fingerprint_error: Option<FetchError>,
    payload_error: Option<FetchError>,
    fingerprint_calls: usize,
    payload_calls: usize,
}

impl StubUnit {
    /// A unit that reports `fingerprint` and serves one record per id. An
    /// empty id fails conversion.
    pub fn new(resource: &str, fingerprint: &str, ids: &[&str]) -> Self {
        Self {
            resource: resource.to_owned(),
            scope: KeyScope::Global,
            state: Arc::new(Mutex::new(StubState {
                fingerprint: fingerprint.to_owned(),
                ids: ids.iter().map(|s| (*s).to_owned()).collect(),
                fingerprint_error: None,
                payload_error: None,
                fingerprint_calls: 0,
                payload_calls: 0,
            })),
        }
    }

    pub fn with_scope(mut self, scope: KeyScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn failing_fingerprint(self, error: FetchError) -> Self {
        self.set_fingerprint_error(Some(error));
        self
    }

    pub fn failing_payload(self, error: FetchError) -> Self {
        self.set_payload_error(Some(error));
        self
    }

    pub fn set_fingerprint_error(&self, error: Option<FetchError>) {
        self.state.lock().unwrap().fingerprint_error = error;
    }

    pub fn set_payload_error(&self, error: Option<FetchError>) {
        self.state.lock().unwrap().payload_error = error;
    }

    /// Change what the remote side serves.
    pub fn set_remote(&self, fingerprint: &str, ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.fingerprint = fingerprint.to_owned();
        state.ids = ids.iter().map(|s| (*s).to_owned()).collect();
    }

    pub fn fingerprint_calls(&self) -> usize {
        self.state.lock().unwrap().fingerprint_calls
    }

    pub fn payload_calls(&self) -> usize {
        self.state.lock().unwrap().payload_calls
    }
}

#[async_trait::async_trait]
impl<P: SyncParams> SyncUnit<P> for StubUnit {
    type Remote = Vec<String>;
    type Local = Vec<StoredRecord>;

    fn resource(&self) -> &str {
        &self.resource
    }

    fn scope(&self) -> KeyScope {
        self.scope
    }

    async fn fetch_fingerprint(&self, _params: &P) -> Result<Fingerprint, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.fingerprint_calls += 1;
        match &state.fingerprint_error {
            Some(e) => Err(e.clone()),
            None => Ok(Fingerprint::new(state.fingerprint.clone())),
        }
    }

    async fn fetch_payload(&self, _params: &P) -> Result<Vec<String>, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.payload_calls += 1;
        match &state.payload_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.ids.clone()),
        }
    }

    fn convert(&self, _params: &P, remote: Vec<String>) -> Result<Vec<StoredRecord>, ConvertError> {
        remote
            .into_iter()
            .map(|id| {
                if id.is_empty() {
                    return Err(ConvertError::MissingField("id"));
                }
                let body = format!("{{\"id\":\"{id}\"}}");
                Ok(StoredRecord::new(id, body))
            })
            .collect()
    }

    fn persist(
        &self,
        params: &P,
        local: Vec<StoredRecord>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        tx.replace_records(&SyncUnit::<P>::record_set(self, params), &local)
    }
}
