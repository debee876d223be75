use std::sync::Arc;

use async_trait::async_trait;
use menza_sync::{
    ConvertError, Dataset, FetchError, Fingerprint, KeyScope, StorageError, StoredRecord,
    SyncOrchestrator, SyncUnit, UnitTransaction, ValidityPolicy, ValidityTracker,
};

use crate::client::MenzaClient;
use crate::domains::MenzaParams;
use crate::model::{self, CafeteriaInfo, OpeningHours};
use crate::wire::{CafeteriaInfoDto, OpeningHoursDto};

pub const NAME: &str = "cafeteria-info";

pub fn dataset(
    client: Arc<MenzaClient>,
    orchestrator: Arc<SyncOrchestrator>,
    tracker: Arc<ValidityTracker>,
) -> Dataset<MenzaParams> {
    Dataset::new(
        NAME,
        ValidityPolicy::days(7),
        KeyScope::LanguageAndSubsystem,
        orchestrator,
        tracker,
    )
    .with_unit(CafeteriaInfoUnit::new(client))
}

/// Address, contacts, and opening hours of one subsystem. Stored as a
/// single record.
pub struct CafeteriaInfoUnit {
    client: Arc<MenzaClient>,
}

impl CafeteriaInfoUnit {
    pub fn new(client: Arc<MenzaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for CafeteriaInfoUnit {
    type Remote = CafeteriaInfoDto;
    type Local = CafeteriaInfo;

    fn resource(&self) -> &str {
        "cafeteria-info"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::LanguageAndSubsystem
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        let subsystem = params.require_subsystem("cafeteria-info")?;
        self.client
            .fingerprint(&params.language, "info", Some(subsystem))
            .await
    }

    async fn fetch_payload(&self, params: &MenzaParams) -> Result<CafeteriaInfoDto, FetchError> {
        let subsystem = params.require_subsystem("cafeteria-info")?;
        self.client.cafeteria_info(&params.language, subsystem).await
    }

    fn convert(
        &self,
        params: &MenzaParams,
        remote: CafeteriaInfoDto,
    ) -> Result<CafeteriaInfo, ConvertError> {
        let subsystem_id = params
            .subsystem
            .ok_or(ConvertError::MissingField("subsystem"))?;

        let opening_hours = remote
            .opening_hours
            .iter()
            .map(convert_hours)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CafeteriaInfo {
            subsystem_id,
            name: model::require_name(&remote.name)?,
            address: remote.address,
            phone: remote.phone,
            email: remote.email,
            opening_hours,
        })
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: CafeteriaInfo,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let record = StoredRecord::encode(local.subsystem_id.to_string(), &local)?;
        tx.replace_records(&self.record_set(params), &[record])
    }
}

fn convert_hours(dto: &OpeningHoursDto) -> Result<OpeningHours, ConvertError> {
    let valid_day = 1..=7;
    if !valid_day.contains(&dto.day_from)
        || !valid_day.contains(&dto.day_to)
        || dto.day_from > dto.day_to
    {
        return Err(ConvertError::invalid(
            "opening days",
            format!("{}-{}", dto.day_from, dto.day_to),
        ));
    }

    let start = model::parse_time(&dto.start)?;
    let end = model::parse_time(&dto.end)?;
    if start >= end {
        return Err(ConvertError::invalid(
            "opening hours",
            format!("{}-{}", dto.start, dto.end),
        ));
    }

    Ok(OpeningHours {
        day_from: dto.day_from,
        day_to: dto.day_to,
        start,
        end,
        description: dto.description.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(day_from: u8, day_to: u8, start: &str, end: &str) -> OpeningHoursDto {
        OpeningHoursDto {
            day_from,
            day_to,
            start: start.into(),
            end: end.into(),
            description: None,
        }
    }

    #[test]
    fn valid_range_converts() {
        let converted = convert_hours(&hours(1, 5, "10:30", "14:00")).unwrap();
        assert_eq!(converted.day_from, 1);
        assert_eq!(converted.end.to_string(), "14:00:00");
    }

    #[test]
    fn range_must_end_after_it_starts() {
        assert!(convert_hours(&hours(1, 5, "14:00", "10:30")).is_err());
        assert!(convert_hours(&hours(1, 5, "11:00", "11:00")).is_err());
    }

    #[test]
    fn days_must_be_weekdays_in_order() {
        assert!(convert_hours(&hours(0, 5, "10:00", "14:00")).is_err());
        assert!(convert_hours(&hours(5, 1, "10:00", "14:00")).is_err());
        assert!(convert_hours(&hours(6, 8, "10:00", "14:00")).is_err());
    }
}
