//! Datasets served by the cafeteria backend and the units they consist of.

pub mod cafeteria_info;
pub mod dishes;
pub mod menu_list;
pub mod weekly_menu;

use std::sync::Arc;

use menza_sync::{Dataset, FetchError, SyncOrchestrator, SyncParams, ValidityTracker};

use crate::client::MenzaClient;

/// Parameters every domain sync runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenzaParams {
    pub language: String,
    /// Selected cafeteria subsystem. Only the menu list can sync without one.
    pub subsystem: Option<u32>,
}

impl MenzaParams {
    pub fn new(language: impl Into<String>, subsystem: Option<u32>) -> Self {
        Self {
            language: language.into(),
            subsystem,
        }
    }

    fn require_subsystem(&self, resource: &str) -> Result<u32, FetchError> {
        self.subsystem
            .ok_or_else(|| FetchError::Unavailable(format!("{resource} requires a subsystem")))
    }
}

impl SyncParams for MenzaParams {
    fn language(&self) -> Option<&str> {
        Some(&self.language)
    }

    fn subsystem(&self) -> Option<u32> {
        self.subsystem
    }
}

/// The four datasets, wired to one client, orchestrator, and tracker.
pub struct Domains {
    pub menu_list: Dataset<MenzaParams>,
    pub dishes: Dataset<MenzaParams>,
    pub cafeteria_info: Dataset<MenzaParams>,
    pub weekly_menu: Dataset<MenzaParams>,
}

impl Domains {
    pub fn new(
        client: Arc<MenzaClient>,
        orchestrator: Arc<SyncOrchestrator>,
        tracker: Arc<ValidityTracker>,
        fan_out_limit: usize,
    ) -> Self {
        Self {
            menu_list: menu_list::dataset(
                Arc::clone(&client),
                Arc::clone(&orchestrator),
                Arc::clone(&tracker),
            ),
            dishes: dishes::dataset(
                Arc::clone(&client),
                Arc::clone(&orchestrator),
                Arc::clone(&tracker),
            ),
            cafeteria_info: cafeteria_info::dataset(
                Arc::clone(&client),
                Arc::clone(&orchestrator),
                Arc::clone(&tracker),
            ),
            weekly_menu: weekly_menu::dataset(client, orchestrator, tracker, fan_out_limit),
        }
    }

    /// All datasets, menu list first.
    pub fn all(&self) -> [&Dataset<MenzaParams>; 4] {
        [
            &self.menu_list,
            &self.dishes,
            &self.cafeteria_info,
            &self.weekly_menu,
        ]
    }

    pub fn get(&self, name: &str) -> Option<&Dataset<MenzaParams>> {
        self.all().into_iter().find(|d| d.name() == name)
    }
}
