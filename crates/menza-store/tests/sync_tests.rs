use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, TimeDelta, TimeZone, Utc};
use menza_store::SqliteStore;
use menza_sync::test_support::{ManualClock, StubUnit};
use menza_sync::{
    Clock, ConvertError, Dataset, FailureKind, FetchError, Fingerprint, FingerprintKey,
    FingerprintStore, KeyScope, Outcome, RecordSet, Storage, StorageError, StoredRecord,
    SyncOrchestrator, SyncParams, SyncUnit, UnitOutcome, UnitTransaction, ValidityPolicy,
    ValidityStore, ValidityTracker,
};
use serde::{Deserialize, Serialize};

struct Params {
    language: String,
    subsystem: u32,
}

impl SyncParams for Params {
    fn language(&self) -> Option<&str> {
        Some(&self.language)
    }

    fn subsystem(&self) -> Option<u32> {
        Some(self.subsystem)
    }
}

fn params() -> Params {
    Params {
        language: "cs".into(),
        subsystem: 1,
    }
}

struct Harness {
    store: Arc<SqliteStore>,
    clock: Arc<ManualClock>,
    orchestrator: Arc<SyncOrchestrator>,
    tracker: Arc<ValidityTracker>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap(),
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&store) as Arc<dyn Storage>
        ));
        let tracker = Arc::new(ValidityTracker::new(
            Arc::clone(&store) as Arc<dyn ValidityStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            FixedOffset::east_opt(3600).unwrap(),
        ));
        Self {
            store,
            clock,
            orchestrator,
            tracker,
        }
    }

    fn dataset(&self, policy: ValidityPolicy) -> Dataset<Params> {
        Dataset::new(
            "dishes",
            policy,
            KeyScope::LanguageAndSubsystem,
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.tracker),
        )
    }

    fn ids(&self, resource: &str) -> Vec<String> {
        self.store
            .records(&RecordSet::new(resource, "lang=cs;subsystem=1"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    fn fingerprint(&self, resource: &str) -> Option<Fingerprint> {
        self.store
            .fingerprint(&FingerprintKey::new(resource, "lang=cs;subsystem=1"))
            .unwrap()
    }
}

fn unit(resource: &str, fingerprint: &str, ids: &[&str]) -> StubUnit {
    StubUnit::new(resource, fingerprint, ids).with_scope(KeyScope::LanguageAndSubsystem)
}

#[tokio::test]
async fn second_unforced_sync_is_skipped() {
    let h = Harness::new();
    let dishes = unit("dishes", "A", &["1", "2"]);
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(dishes.clone());

    assert_eq!(dataset.sync(&params(), false).await, Outcome::Success);
    assert_eq!(dataset.sync(&params(), false).await, Outcome::Skipped);

    assert_eq!(h.ids("dishes"), vec!["1", "2"]);
    assert_eq!(dishes.fingerprint_calls(), 1);
    assert_eq!(dishes.payload_calls(), 1);
}

#[tokio::test]
async fn forced_sync_checks_fingerprints_and_advances_freshness() {
    let h = Harness::new();
    let dishes = unit("dishes", "A", &["1"]);
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(dishes.clone());

    dataset.sync(&params(), false).await;
    let first = dataset.last_confirmed(&params()).unwrap().unwrap();

    h.clock.advance(TimeDelta::minutes(5));
    let report = dataset.sync_report(&params(), true).await.unwrap();

    assert_eq!(report.outcome, Outcome::Skipped);
    assert_eq!(report.unit("dishes"), Some(&UnitOutcome::Unchanged));
    assert_eq!(dishes.fingerprint_calls(), 2);
    assert_eq!(dishes.payload_calls(), 1);

    let second = dataset.last_confirmed(&params()).unwrap().unwrap();
    assert_eq!(second - first, TimeDelta::minutes(5));
}

#[tokio::test]
async fn only_changed_units_are_refetched() {
    let h = Harness::new();
    let dishes = unit("dishes", "A", &["1", "2"]);
    let categories = unit("dish-categories", "X", &["soup"]);
    let dataset = h
        .dataset(ValidityPolicy::Always)
        .with_unit(dishes.clone())
        .with_unit(categories.clone());

    assert_eq!(dataset.sync(&params(), false).await, Outcome::Success);

    categories.set_remote("B", &["soup", "main"]);
    let report = dataset.sync_report(&params(), false).await.unwrap();

    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.unit("dishes"), Some(&UnitOutcome::Unchanged));
    assert_eq!(report.unit("dish-categories"), Some(&UnitOutcome::Updated));
    assert_eq!(dishes.payload_calls(), 1);
    assert_eq!(h.ids("dish-categories"), vec!["soup", "main"]);
    assert_eq!(h.fingerprint("dish-categories"), Some(Fingerprint::new("B")));
    assert_eq!(h.fingerprint("dishes"), Some(Fingerprint::new("A")));
}

#[tokio::test]
async fn failing_unit_does_not_undo_its_siblings() {
    let h = Harness::new();
    let dataset = h
        .dataset(ValidityPolicy::Today)
        .with_unit(unit("dishes", "d1", &["1"]))
        .with_unit(unit("dish-categories", "c1", &["soup"]))
        .with_unit(
            unit("serving-places", "s1", &["hall"])
                .failing_payload(FetchError::Network("connection reset".into())),
        )
        .with_unit(unit("pictograms", "p1", &["vegan"]));

    let outcome = dataset.sync(&params(), false).await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Network);
    assert_eq!(failure.resource, "serving-places");

    assert_eq!(h.ids("dishes"), vec!["1"]);
    assert_eq!(h.ids("dish-categories"), vec!["soup"]);
    assert_eq!(h.ids("pictograms"), vec!["vegan"]);
    assert!(h.ids("serving-places").is_empty());
    assert_eq!(h.fingerprint("serving-places"), None);

    // A failed outcome leaves the dataset stale.
    assert!(!dataset.is_fresh(&params()));
}

#[tokio::test]
async fn unavailable_clears_records_and_stays_quiet() {
    let h = Harness::new();
    let weekly = unit("weekly-menu", "w1", &["mon", "tue"]);
    let dataset = h.dataset(ValidityPolicy::ThisWeek).with_unit(weekly.clone());

    assert_eq!(dataset.sync(&params(), false).await, Outcome::Success);
    assert_eq!(h.ids("weekly-menu").len(), 2);

    weekly.set_fingerprint_error(Some(FetchError::Unavailable("no menu".into())));
    assert_eq!(dataset.sync(&params(), true).await, Outcome::Unavailable);
    assert!(h.ids("weekly-menu").is_empty());

    h.clock.advance(TimeDelta::hours(1));
    let calls = weekly.fingerprint_calls();
    assert_eq!(dataset.sync(&params(), false).await, Outcome::Skipped);
    assert_eq!(weekly.fingerprint_calls(), calls);
}

#[tokio::test]
async fn menu_returning_after_unavailable_is_refetched() {
    let h = Harness::new();
    let weekly = unit("weekly-menu", "w1", &["mon", "tue"]);
    let dataset = h.dataset(ValidityPolicy::ThisWeek).with_unit(weekly.clone());
    dataset.sync(&params(), false).await;

    weekly.set_fingerprint_error(Some(FetchError::Unavailable("no menu".into())));
    assert_eq!(dataset.sync(&params(), true).await, Outcome::Unavailable);
    assert_eq!(h.fingerprint("weekly-menu"), Some(Fingerprint::cleared()));

    weekly.set_fingerprint_error(None);
    assert_eq!(dataset.sync(&params(), true).await, Outcome::Success);

    assert_eq!(h.ids("weekly-menu"), vec!["mon", "tue"]);
    assert_eq!(h.fingerprint("weekly-menu"), Some(Fingerprint::new("w1")));
    assert_eq!(weekly.payload_calls(), 2);
}

#[tokio::test]
async fn window_expires_at_local_midnight() {
    let h = Harness::new();
    h.clock
        .set(Utc.with_ymd_and_hms(2024, 3, 12, 22, 30, 0).unwrap());
    let dishes = unit("dishes", "A", &["1"]);
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(dishes.clone());

    dataset.sync(&params(), false).await;

    // 23:59 local time, same day.
    h.clock
        .set(Utc.with_ymd_and_hms(2024, 3, 12, 22, 59, 0).unwrap());
    assert!(dataset.is_fresh(&params()));

    // 00:01 local time, next day.
    h.clock
        .set(Utc.with_ymd_and_hms(2024, 3, 12, 23, 1, 0).unwrap());
    assert!(!dataset.is_fresh(&params()));

    dataset.sync(&params(), false).await;
    assert_eq!(dishes.fingerprint_calls(), 2);
}

#[tokio::test]
async fn rebuild_rewrites_unchanged_units() {
    let h = Harness::new();
    let dishes = unit("dishes", "A", &["1"]);
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(dishes.clone());

    dataset.sync(&params(), false).await;
    assert_eq!(dataset.rebuild(&params()).await, Outcome::Success);

    assert_eq!(dishes.payload_calls(), 2);
    assert_eq!(h.ids("dishes"), vec!["1"]);
}

#[tokio::test]
async fn wipe_makes_the_next_sync_fetch_everything() {
    let h = Harness::new();
    let dishes = unit("dishes", "A", &["1"]);
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(dishes.clone());

    dataset.sync(&params(), false).await;
    h.store.wipe().unwrap();

    assert_eq!(dataset.last_confirmed(&params()).unwrap(), None);
    assert_eq!(dataset.sync(&params(), false).await, Outcome::Success);
    assert_eq!(dishes.payload_calls(), 2);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dish {
    id: u32,
    name: String,
    price_cents: u32,
}

struct PricedDishes {
    remote: Vec<(u32, &'static str, &'static str)>,
}

#[async_trait]
impl SyncUnit<Params> for PricedDishes {
    type Remote = Vec<(u32, &'static str, &'static str)>;
    type Local = Vec<Dish>;

    fn resource(&self) -> &str {
        "dishes"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::LanguageAndSubsystem
    }

    async fn fetch_fingerprint(&self, _params: &Params) -> Result<Fingerprint, FetchError> {
        Ok(Fingerprint::new("priced"))
    }

    async fn fetch_payload(&self, _params: &Params) -> Result<Self::Remote, FetchError> {
        Ok(self.remote.clone())
    }

    fn convert(&self, _params: &Params, remote: Self::Remote) -> Result<Vec<Dish>, ConvertError> {
        remote
            .into_iter()
            .map(|(id, name, price)| {
                let price_cents = price
                    .parse::<u32>()
                    .map_err(|_| ConvertError::invalid("price", price))?;
                Ok(Dish {
                    id,
                    name: name.to_owned(),
                    price_cents,
                })
            })
            .collect()
    }

    fn persist(
        &self,
        params: &Params,
        local: Vec<Dish>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = local
            .iter()
            .map(|dish| StoredRecord::encode(dish.id.to_string(), dish))
            .collect::<Result<Vec<_>, _>>()?;
        tx.replace_records(&self.record_set(params), &records)
    }
}

#[tokio::test]
async fn typed_records_round_trip_through_sqlite() {
    let h = Harness::new();
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(PricedDishes {
        remote: vec![(7, "Svickova", "119"), (3, "Gulas", "95")],
    });

    assert_eq!(dataset.sync(&params(), false).await, Outcome::Success);

    let dishes: Vec<Dish> = h
        .store
        .records(&RecordSet::new("dishes", "lang=cs;subsystem=1"))
        .unwrap()
        .iter()
        .map(|r| r.decode().unwrap())
        .collect();
    assert_eq!(dishes[0].name, "Svickova");
    assert_eq!(dishes[1].price_cents, 95);
}

#[tokio::test]
async fn conversion_error_persists_nothing() {
    let h = Harness::new();
    let dataset = h.dataset(ValidityPolicy::Today).with_unit(PricedDishes {
        remote: vec![(7, "Svickova", "119"), (3, "Gulas", "cheap")],
    });

    let outcome = dataset.sync(&params(), false).await;

    assert_eq!(outcome.failure().unwrap().kind, FailureKind::Parse);
    assert!(h.ids("dishes").is_empty());
    assert_eq!(h.fingerprint("dishes"), None);
}
