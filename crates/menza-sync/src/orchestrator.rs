use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fingerprint::SyncParams;
use crate::outcome::{BatchReport, SyncFailure, UnitOutcome, UnitReport};
use crate::storage::Storage;
use crate::unit::{DynSyncUnit, UnitError};

/// How the orchestrator treats stored fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Regular request.
    Normal,
    /// The caller bypassed the validity window. Unchanged fingerprints are
    /// still skipped.
    Forced,
    /// Ignore stored fingerprints and refetch every unit.
    Rebuild,
}

impl SyncMode {
    pub fn from_forced(forced: bool) -> Self {
        if forced { Self::Forced } else { Self::Normal }
    }

    pub fn bypasses_window(self) -> bool {
        !matches!(self, Self::Normal)
    }

    fn ignores_fingerprints(self) -> bool {
        matches!(self, Self::Rebuild)
    }
}

/// What the loop should do after a unit finished.
enum Next {
    Continue,
    Stop,
}

/// Runs batches of sync units against one storage.
///
/// Every unit commits on its own: a failure later in the batch never rolls
/// back units that were already written.
pub struct SyncOrchestrator {
    storage: Arc<dyn Storage>,
}

impl SyncOrchestrator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Sync `units` in declaration order and aggregate their outcomes.
    pub async fn run<P: SyncParams>(
        &self,
        units: &[Box<dyn DynSyncUnit<P>>],
        params: &P,
        mode: SyncMode,
    ) -> BatchReport {
        let mut reports = Vec::with_capacity(units.len());
        let mut aborted = false;

        for unit in units {
            let (outcome, next) = self.run_unit(unit.as_ref(), params, mode).await;
            reports.push(UnitReport {
                resource: unit.resource().to_owned(),
                outcome,
            });

            if let Next::Stop = next {
                aborted = reports.len() < units.len();
                break;
            }
        }

        let report = BatchReport::new(reports, aborted);
        info!(
            updated = report.updated(),
            unchanged = report.unchanged(),
            failed = report.failed(),
            aborted = report.aborted,
            outcome = %report.outcome,
            "sync batch finished"
        );
        report
    }

    async fn run_unit<P: SyncParams>(
        &self,
        unit: &dyn DynSyncUnit<P>,
        params: &P,
        mode: SyncMode,
    ) -> (UnitOutcome, Next) {
        let key = unit.fingerprint_key(params);

        let fingerprint = match unit.fetch_fingerprint(params).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => return self.unit_failed(unit, params, e.into()),
        };

        if !mode.ignores_fingerprints() {
            match self.storage.fingerprint(&key) {
                Ok(Some(stored)) if stored == fingerprint && !stored.is_cleared() => {
                    debug!(key = %key, "fingerprint unchanged, skipping");
                    return (UnitOutcome::Unchanged, Next::Continue);
                }
                Ok(_) => {}
                Err(e) => return self.unit_failed(unit, params, e.into()),
            }
        }

        debug!(key = %key, fingerprint = %fingerprint, "fingerprint changed, fetching payload");
        match unit
            .apply(params, &fingerprint, self.storage.as_ref())
            .await
        {
            Ok(()) => {
                info!(key = %key, "unit updated");
                (UnitOutcome::Updated, Next::Continue)
            }
            Err(e) => self.unit_failed(unit, params, e),
        }
    }

    fn unit_failed<P: SyncParams>(
        &self,
        unit: &dyn DynSyncUnit<P>,
        params: &P,
        error: UnitError,
    ) -> (UnitOutcome, Next) {
        let resource = unit.resource();

        if error.is_unavailable() {
            info!(resource, error = %error, "resource unavailable, clearing local records");
            if let Err(e) = unit.clear(params, self.storage.as_ref()) {
                warn!(resource, error = %e, "could not clear unavailable resource");
                let failure = SyncFailure::from_unit_error(resource, &e.into());
                return (UnitOutcome::Failed(failure), Next::Stop);
            }
            return (UnitOutcome::Unavailable, Next::Stop);
        }

        let failure = SyncFailure::from_unit_error(resource, &error);
        if error.is_batch_fatal() {
            warn!(resource, error = %error, "batch-fatal error, aborting run");
            (UnitOutcome::Failed(failure), Next::Stop)
        } else {
            warn!(resource, error = %error, "unit failed, continuing with the rest");
            (UnitOutcome::Failed(failure), Next::Continue)
        }
    }
}
