use std::sync::Arc;

use async_trait::async_trait;
use menza_sync::{
    ConvertError, Dataset, FetchError, Fingerprint, KeyScope, StorageError, SyncOrchestrator,
    SyncUnit, UnitTransaction, ValidityPolicy, ValidityTracker, fan_out,
};
use tracing::debug;

use crate::client::MenzaClient;
use crate::domains::MenzaParams;
use crate::model::{self, Course, MenuDay};
use crate::wire::{WeekDayDto, WeekDto};

pub const NAME: &str = "weekly-menu";

pub fn dataset(
    client: Arc<MenzaClient>,
    orchestrator: Arc<SyncOrchestrator>,
    tracker: Arc<ValidityTracker>,
    fan_out_limit: usize,
) -> Dataset<MenzaParams> {
    Dataset::new(
        NAME,
        ValidityPolicy::ThisWeek,
        KeyScope::LanguageAndSubsystem,
        orchestrator,
        tracker,
    )
    .with_unit(WeeklyMenuUnit::new(client, fan_out_limit))
}

/// Menu for every published week, fetched one week per request.
pub struct WeeklyMenuUnit {
    client: Arc<MenzaClient>,
    fan_out_limit: usize,
}

impl WeeklyMenuUnit {
    pub fn new(client: Arc<MenzaClient>, fan_out_limit: usize) -> Self {
        Self {
            client,
            fan_out_limit,
        }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for WeeklyMenuUnit {
    type Remote = Vec<WeekDto>;
    type Local = Vec<MenuDay>;

    fn resource(&self) -> &str {
        "weekly-menu"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::LanguageAndSubsystem
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        let subsystem = params.require_subsystem("weekly-menu")?;
        self.client
            .fingerprint(&params.language, "weeks", Some(subsystem))
            .await
    }

    async fn fetch_payload(&self, params: &MenzaParams) -> Result<Vec<WeekDto>, FetchError> {
        let subsystem = params.require_subsystem("weekly-menu")?;
        let language = params.language.as_str();
        let client = self.client.as_ref();

        let mut weeks = client.weeks(language, subsystem).await?;
        weeks.sort_by_key(|w| w.ordinal);
        debug!(subsystem, weeks = weeks.len(), "fetching weekly menus");

        fan_out(weeks, self.fan_out_limit, |week| async move {
            client.week(language, subsystem, week.id).await
        })
        .await
    }

    fn convert(
        &self,
        _params: &MenzaParams,
        remote: Vec<WeekDto>,
    ) -> Result<Vec<MenuDay>, ConvertError> {
        let mut days = remote
            .iter()
            .flat_map(|week| week.days.iter().map(move |day| convert_day(week.ordinal, day)))
            .collect::<Result<Vec<_>, _>>()?;

        days.sort_by_key(|d| d.date);
        model::ensure_unique(days.iter().map(|d| d.date))?;
        Ok(days)
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: Vec<MenuDay>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = model::to_records(&local, |d| d.date)?;
        tx.replace_records(&self.record_set(params), &records)
    }
}

fn convert_day(week_ordinal: u32, day: &WeekDayDto) -> Result<MenuDay, ConvertError> {
    let courses = day
        .courses
        .iter()
        .map(|c| {
            Ok(Course {
                course: c.course.trim().to_owned(),
                name: model::require_name(&c.name)?,
                amount: c.amount.clone(),
            })
        })
        .collect::<Result<Vec<_>, ConvertError>>()?;

    Ok(MenuDay {
        date: model::parse_date(&day.date)?,
        week_ordinal,
        courses,
    })
}
