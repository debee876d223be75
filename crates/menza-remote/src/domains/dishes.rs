use std::sync::Arc;

use async_trait::async_trait;
use menza_sync::{
    ConvertError, Dataset, FetchError, Fingerprint, KeyScope, StorageError, SyncOrchestrator,
    SyncUnit, UnitTransaction, ValidityPolicy, ValidityTracker,
};

use crate::client::MenzaClient;
use crate::domains::MenzaParams;
use crate::model::{self, Dish, DishCategory, Pictogram, ServingPlace};
use crate::wire::{CategoryDto, DishDto, PictogramDto, ServingPlaceDto};

pub const NAME: &str = "dishes";

/// Today's dishes with everything needed to render them. Each part is hashed
/// separately, so a new dish does not refetch the pictogram catalogue.
pub fn dataset(
    client: Arc<MenzaClient>,
    orchestrator: Arc<SyncOrchestrator>,
    tracker: Arc<ValidityTracker>,
) -> Dataset<MenzaParams> {
    Dataset::new(
        NAME,
        ValidityPolicy::Today,
        KeyScope::LanguageAndSubsystem,
        orchestrator,
        tracker,
    )
    .with_unit(DishesUnit::new(Arc::clone(&client)))
    .with_unit(CategoriesUnit::new(Arc::clone(&client)))
    .with_unit(ServingPlacesUnit::new(Arc::clone(&client)))
    .with_unit(PictogramsUnit::new(client))
}

pub struct DishesUnit {
    client: Arc<MenzaClient>,
}

impl DishesUnit {
    pub fn new(client: Arc<MenzaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for DishesUnit {
    type Remote = Vec<DishDto>;
    type Local = Vec<Dish>;

    fn resource(&self) -> &str {
        "dishes"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::LanguageAndSubsystem
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        let subsystem = params.require_subsystem("dishes")?;
        self.client
            .fingerprint(&params.language, "dishes", Some(subsystem))
            .await
    }

    async fn fetch_payload(&self, params: &MenzaParams) -> Result<Vec<DishDto>, FetchError> {
        let subsystem = params.require_subsystem("dishes")?;
        self.client.dishes(&params.language, subsystem).await
    }

    fn convert(
        &self,
        params: &MenzaParams,
        remote: Vec<DishDto>,
    ) -> Result<Vec<Dish>, ConvertError> {
        let subsystem_id = params
            .subsystem
            .ok_or(ConvertError::MissingField("subsystem"))?;
        model::ensure_unique(remote.iter().map(|d| d.id))?;

        remote
            .into_iter()
            .map(|dto| {
                Ok(Dish {
                    id: dto.id,
                    subsystem_id,
                    name: model::require_name(&dto.name)?,
                    category_id: dto.category_id,
                    serving_place_ids: dto.serving_place_ids,
                    price_student_cents: model::parse_optional_price(dto.price_student.as_deref())?,
                    price_employee_cents: model::parse_optional_price(
                        dto.price_employee.as_deref(),
                    )?,
                    weight: dto.weight.filter(|w| !w.trim().is_empty()),
                    allergens: dto.allergens,
                    pictogram_ids: dto.pictogram_ids,
                    photo_url: dto.photo_url,
                })
            })
            .collect()
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: Vec<Dish>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = model::to_records(&local, |d| d.id)?;
        tx.replace_records(&self.record_set(params), &records)
    }
}

pub struct CategoriesUnit {
    client: Arc<MenzaClient>,
}

impl CategoriesUnit {
    pub fn new(client: Arc<MenzaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for CategoriesUnit {
    type Remote = Vec<CategoryDto>;
    type Local = Vec<DishCategory>;

    fn resource(&self) -> &str {
        "dish-categories"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::LanguageAndSubsystem
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        let subsystem = params.require_subsystem("dish-categories")?;
        self.client
            .fingerprint(&params.language, "categories", Some(subsystem))
            .await
    }

    async fn fetch_payload(&self, params: &MenzaParams) -> Result<Vec<CategoryDto>, FetchError> {
        let subsystem = params.require_subsystem("dish-categories")?;
        self.client.categories(&params.language, subsystem).await
    }

    fn convert(
        &self,
        _params: &MenzaParams,
        remote: Vec<CategoryDto>,
    ) -> Result<Vec<DishCategory>, ConvertError> {
        model::ensure_unique(remote.iter().map(|c| c.id))?;

        let mut categories = remote
            .into_iter()
            .map(|dto| {
                Ok(DishCategory {
                    id: dto.id,
                    name: model::require_name(&dto.name)?,
                    order: dto.order,
                })
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        categories.sort_by_key(|c| (c.order, c.id));
        Ok(categories)
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: Vec<DishCategory>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = model::to_records(&local, |c| c.id)?;
        tx.replace_records(&self.record_set(params), &records)
    }
}

pub struct ServingPlacesUnit {
    client: Arc<MenzaClient>,
}

impl ServingPlacesUnit {
    pub fn new(client: Arc<MenzaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for ServingPlacesUnit {
    type Remote = Vec<ServingPlaceDto>;
    type Local = Vec<ServingPlace>;

    fn resource(&self) -> &str {
        "serving-places"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::LanguageAndSubsystem
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        let subsystem = params.require_subsystem("serving-places")?;
        self.client
            .fingerprint(&params.language, "serving-places", Some(subsystem))
            .await
    }

    async fn fetch_payload(
        &self,
        params: &MenzaParams,
    ) -> Result<Vec<ServingPlaceDto>, FetchError> {
        let subsystem = params.require_subsystem("serving-places")?;
        self.client.serving_places(&params.language, subsystem).await
    }

    fn convert(
        &self,
        _params: &MenzaParams,
        remote: Vec<ServingPlaceDto>,
    ) -> Result<Vec<ServingPlace>, ConvertError> {
        model::ensure_unique(remote.iter().map(|p| p.id))?;

        remote
            .into_iter()
            .map(|dto| {
                Ok(ServingPlace {
                    id: dto.id,
                    name: model::require_name(&dto.name)?,
                    abbreviation: dto.abbreviation,
                    description: dto.description,
                })
            })
            .collect()
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: Vec<ServingPlace>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = model::to_records(&local, |p| p.id)?;
        tx.replace_records(&self.record_set(params), &records)
    }
}

/// Dietary pictograms. The catalogue depends on the language only.
pub struct PictogramsUnit {
    client: Arc<MenzaClient>,
}

impl PictogramsUnit {
    pub fn new(client: Arc<MenzaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SyncUnit<MenzaParams> for PictogramsUnit {
    type Remote = Vec<PictogramDto>;
    type Local = Vec<Pictogram>;

    fn resource(&self) -> &str {
        "pictograms"
    }

    fn scope(&self) -> KeyScope {
        KeyScope::Language
    }

    async fn fetch_fingerprint(&self, params: &MenzaParams) -> Result<Fingerprint, FetchError> {
        self.client
            .fingerprint(&params.language, "pictograms", None)
            .await
    }

    async fn fetch_payload(&self, params: &MenzaParams) -> Result<Vec<PictogramDto>, FetchError> {
        self.client.pictograms(&params.language).await
    }

    fn convert(
        &self,
        _params: &MenzaParams,
        remote: Vec<PictogramDto>,
    ) -> Result<Vec<Pictogram>, ConvertError> {
        model::ensure_unique(remote.iter().map(|p| p.id))?;

        remote
            .into_iter()
            .map(|dto| {
                Ok(Pictogram {
                    id: dto.id,
                    name: model::require_name(&dto.name)?,
                    icon_url: dto.icon_url,
                })
            })
            .collect()
    }

    fn persist(
        &self,
        params: &MenzaParams,
        local: Vec<Pictogram>,
        tx: &mut dyn UnitTransaction,
    ) -> Result<(), StorageError> {
        let records = model::to_records(&local, |p| p.id)?;
        tx.replace_records(&self.record_set(params), &records)
    }
}
