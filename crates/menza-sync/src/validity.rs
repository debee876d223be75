use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::outcome::{BatchReport, Outcome};
use crate::storage::StorageError;

/// How long a synced dataset may be served without checking the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityPolicy {
    /// No window: every request checks the remote.
    Always,
    /// Fresh for a fixed duration after the last confirmation.
    For(TimeDelta),
    /// Fresh until a new ISO week starts in the server time zone.
    ThisWeek,
    /// Fresh until a new calendar day starts in the server time zone.
    Today,
}

impl ValidityPolicy {
    pub fn days(days: i64) -> Self {
        Self::For(TimeDelta::days(days))
    }
}

/// Identity of a dataset whose freshness is tracked as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidityKey {
    pub dataset: String,
    pub scope: String,
}

impl ValidityKey {
    pub fn new(dataset: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            scope: scope.into(),
        }
    }
}

impl fmt::Display for ValidityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.dataset, self.scope)
    }
}

/// Durable last-confirmed-fresh timestamps.
pub trait ValidityStore: Send + Sync {
    fn last_confirmed(&self, key: &ValidityKey) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Record `at` as the latest confirmation. Implementations must ignore
    /// timestamps older than the stored one.
    fn confirm(&self, key: &ValidityKey, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Whether data last confirmed at `last` is still fresh at `now`.
///
/// Calendar policies compare dates in `offset`, the server time zone.
pub fn is_within_window(
    policy: ValidityPolicy,
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> bool {
    let Some(last) = last else {
        return false;
    };

    match policy {
        ValidityPolicy::Always => false,
        ValidityPolicy::For(duration) => last
            .checked_add_signed(duration)
            .is_some_and(|until| now < until),
        ValidityPolicy::ThisWeek => {
            last.with_timezone(offset).iso_week() == now.with_timezone(offset).iso_week()
        }
        ValidityPolicy::Today => {
            last.with_timezone(offset).date_naive() == now.with_timezone(offset).date_naive()
        }
    }
}

/// Gate results that carry an [`Outcome`].
pub trait GatedResult {
    fn outcome(&self) -> &Outcome;
}

impl GatedResult for Outcome {
    fn outcome(&self) -> &Outcome {
        self
    }
}

impl GatedResult for BatchReport {
    fn outcome(&self) -> &Outcome {
        &self.outcome
    }
}

/// Decides whether a dataset needs syncing and records when it last did.
///
/// Calls for the same [`ValidityKey`] are serialized, so two forced syncs of
/// one dataset never interleave their writes.
pub struct ValidityTracker {
    store: Arc<dyn ValidityStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    in_flight: Mutex<HashMap<ValidityKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ValidityTracker {
    pub fn new(store: Arc<dyn ValidityStore>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            offset,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn last_confirmed(&self, key: &ValidityKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.store.last_confirmed(key)
    }

    /// Whether `key` is inside its validity window. Unreadable state counts
    /// as stale.
    pub fn is_fresh(&self, key: &ValidityKey, policy: ValidityPolicy) -> bool {
        let last = match self.store.last_confirmed(key) {
            Ok(last) => last,
            Err(e) => {
                warn!(key = %key, error = %e, "could not read validity, treating as stale");
                None
            }
        };
        is_within_window(policy, last, self.clock.now(), &self.offset)
    }

    /// Run `block` unless the window for `key` is still open.
    ///
    /// Returns `Skipped` without calling `block` when not `forced` and fresh.
    /// Any non-failed result advances the window to now.
    pub async fn with_gated_sync<F, Fut>(
        &self,
        key: &ValidityKey,
        forced: bool,
        policy: ValidityPolicy,
        block: F,
    ) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        self.gate(key, forced, policy, block)
            .await
            .unwrap_or(Outcome::Skipped)
    }

    /// Like [`with_gated_sync`](Self::with_gated_sync), but hands back
    /// whatever `block` produced. `None` means the window gate skipped it.
    pub async fn gate<T, F, Fut>(
        &self,
        key: &ValidityKey,
        forced: bool,
        policy: ValidityPolicy,
        block: F,
    ) -> Option<T>
    where
        T: GatedResult,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.lease(key);
        let _guard = lease.lock.lock().await;

        if !forced && self.is_fresh(key, policy) {
            debug!(key = %key, "validity window open, skipping sync");
            return None;
        }

        let result = block().await;

        if result.outcome().confirms_freshness() {
            self.advance(key);
        } else {
            debug!(key = %key, "sync failed, validity window left untouched");
        }

        Some(result)
    }

    fn advance(&self, key: &ValidityKey) {
        let now = self.clock.now();

        match self.store.last_confirmed(key) {
            Ok(Some(last)) if last >= now => {
                debug!(key = %key, "stored confirmation is newer, keeping it");
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "could not read validity before update"),
        }

        if let Err(e) = self.store.confirm(key, now) {
            warn!(key = %key, error = %e, "could not record validity");
        }
    }

    fn lease<'a>(&'a self, key: &'a ValidityKey) -> KeyLease<'a> {
        let mut locks = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        KeyLease {
            tracker: self,
            key,
            lock: Arc::clone(locks.entry(key.clone()).or_default()),
        }
    }
}

/// A share of one key's lock. The map entry is removed when the last share
/// is dropped.
struct KeyLease<'a> {
    tracker: &'a ValidityTracker,
    key: &'a ValidityKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .tracker
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Shares are only handed out under the map lock, so two references
        // means the map's and ours.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(self.key);
        }
    }
}
