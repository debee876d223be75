use std::sync::Arc;

use async_trait::async_trait;
use menza_sync::{
    ConvertError, Dataset, FetchError, Fingerprint, KeyScope, StorageError, SyncOrchestrator,
    SyncUnit, UnitTransaction, ValidityPolicy, ValidityTracker,
};

use crate::client::MenzaClient;
use crate::domains::MenzaParams;
use crate::model::{self, Subsystem};
use crate::wire::SubsystemDto;

pub const NAME: &str = "menu-list";

pub fn dataset(
    client: Arc<MenzaClient>,
    orchestrator: Arc<SyncOrchestrator>,
    tracker: Arc<ValidityTracker>,
) -> Dataset<MenzaParams> {
    Dataset::new(
        NAME,
        ValidityPolicy::days(7),
        KeyScope::Language,
        orchestrator,
        tracker,
    )
    .with_unit(SubsystemsUnit::new(client))
}

/// The list of cafeterias, shared by every subsystem.
pub struct SubsystemsUnit {
    client: Arc<MenzaClient>,
}

impl SubsystemsUnit {
    pub fn new(client: Arc<MenzaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for SubsystemsUnit {
    type Remote = Vec<SubsystemDto>;
    type Local = Vec<Subsystem>;

    fn resource(&self) -> &str {
        "subsystems"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::Language
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        self.client
            .fingerprint(&params.language, "subsystems", None)
            .await
    }

    async fn fetch_payload(&self, params: &MenzaParams) -> Result<Vec<SubsystemDto>, FetchError> {
        self.client.subsystems(&params.language).await
    }

    fn convert(
        &self,
        _params: &MenzaParams,
        remote: Vec<SubsystemDto>,
    ) -> Result<Vec<Subsystem>, ConvertError> {
        model::ensure_unique(remote.iter().map(|s| s.id))?;

        let mut subsystems = remote
            .into_iter()
            .map(|dto| {
                Ok(Subsystem {
                    id: dto.id,
                    name: model::require_name(&dto.name)?,
                    kind: dto.kind,
                    open: dto.open,
                })
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        subsystems.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subsystems)
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: Vec<Subsystem>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = model::to_records(&local, |s| s.id)?;
        tx.replace_records(&self.record_set(params), &records)
    }
}
