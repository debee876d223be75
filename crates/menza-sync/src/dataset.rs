use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::fingerprint::{KeyScope, SyncParams};
use crate::orchestrator::{SyncMode, SyncOrchestrator};
use crate::outcome::{BatchReport, Outcome};
use crate::storage::{RecordSet, StorageError};
use crate::unit::DynSyncUnit;
use crate::validity::{ValidityKey, ValidityPolicy, ValidityTracker};

/// A logical dataset: units that are only meaningful together, sharing one
/// validity window.
pub struct Dataset<P: SyncParams> {
    name: String,
    policy: ValidityPolicy,
    scope: KeyScope,
    units: Vec<Box<dyn DynSyncUnit<P>>>,
    orchestrator: Arc<SyncOrchestrator>,
    tracker: Arc<ValidityTracker>,
}

impl<P: SyncParams> Dataset<P> {
    pub fn new(
        name: impl Into<String>,
        policy: ValidityPolicy,
        scope: KeyScope,
        orchestrator: Arc<SyncOrchestrator>,
        tracker: Arc<ValidityTracker>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            scope,
            units: Vec::new(),
            orchestrator,
            tracker,
        }
    }

    /// Append a unit. Units run in the order they were added.
    pub fn with_unit(mut self, unit: impl DynSyncUnit<P> + 'static) -> Self {
        self.units.push(Box::new(unit));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> ValidityPolicy {
        self.policy
    }

    pub fn resources(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.resource()).collect()
    }

    /// Where each unit keeps its records for `params`, in unit order.
    pub fn record_sets(&self, params: &P) -> Vec<RecordSet> {
        self.units.iter().map(|u| u.record_set(params)).collect()
    }

    pub fn validity_key(&self, params: &P) -> ValidityKey {
        ValidityKey::new(&self.name, self.scope.discriminator(params))
    }

    pub fn last_confirmed(&self, params: &P) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.tracker.last_confirmed(&self.validity_key(params))
    }

    pub fn is_fresh(&self, params: &P) -> bool {
        self.tracker.is_fresh(&self.validity_key(params), self.policy)
    }

    /// Bring the dataset up to date unless its validity window is still open.
    pub async fn sync(&self, params: &P, forced: bool) -> Outcome {
        match self.sync_report(params, forced).await {
            Some(report) => report.outcome,
            None => Outcome::Skipped,
        }
    }

    /// Like [`sync`](Self::sync), with per-unit detail. `None` means the
    /// validity window skipped the run entirely.
    pub async fn sync_report(&self, params: &P, forced: bool) -> Option<BatchReport> {
        self.gated(params, SyncMode::from_forced(forced)).await
    }

    /// Refetch every unit regardless of stored fingerprints.
    pub async fn rebuild(&self, params: &P) -> Outcome {
        match self.gated(params, SyncMode::Rebuild).await {
            Some(report) => report.outcome,
            None => Outcome::Skipped,
        }
    }

    async fn gated(&self, params: &P, mode: SyncMode) -> Option<BatchReport> {
        let key = self.validity_key(params);
        let report = self
            .tracker
            .gate(&key, mode.bypasses_window(), self.policy, || {
                self.orchestrator.run(&self.units, params, mode)
            })
            .await;

        match &report {
            Some(report) if report.outcome.is_failed() => {
                warn!(
                    dataset = %self.name,
                    key = %key,
                    outcome = %report.outcome,
                    "dataset sync failed"
                );
            }
            Some(report) => {
                info!(
                    dataset = %self.name,
                    key = %key,
                    outcome = %report.outcome,
                    "dataset synced"
                );
            }
            None => {}
        }

        report
    }
}
