pub mod clock;
pub mod dataset;
pub mod fanout;
pub mod fingerprint;
pub mod orchestrator;
pub mod outcome;
pub mod storage;
pub mod unit;
pub mod validity;

pub use clock::{Clock, SystemClock};
pub use dataset::Dataset;
pub use fanout::fan_out;
pub use fingerprint::{Fingerprint, FingerprintKey, FingerprintStore, KeyScope, SyncParams};
pub use orchestrator::{SyncMode, SyncOrchestrator};
pub use outcome::{BatchReport, FailureKind, Outcome, SyncFailure, UnitOutcome, UnitReport};
pub use storage::{RecordSet, Storage, StorageError, StoredRecord, UnitTransaction};
pub use unit::{ConvertError, DynSyncUnit, FetchError, SyncUnit, UnitError};
pub use validity::{ValidityKey, ValidityPolicy, ValidityStore, ValidityTracker};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
