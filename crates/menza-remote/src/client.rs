use std::time::Duration;

use menza_sync::{FetchError, Fingerprint};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::{
    CafeteriaInfoDto, CategoryDto, DishDto, HashDto, PictogramDto, ServingPlaceDto, SubsystemDto,
    WeekDto, WeekRefDto,
};

const DEFAULT_API_BASE: &str = "https://menza.example.cz/api";

/// Configuration for the cafeteria backend client.
#[derive(Debug, Clone)]
pub struct MenzaClientConfig {
    pub api_base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for MenzaClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// HTTP client for the cafeteria backend's JSON API.
///
/// Every call maps HTTP failures onto [`FetchError`]: 404 means the resource
/// does not exist for these parameters, 401/403 is an authorization problem
/// that makes the rest of a batch pointless.
pub struct MenzaClient {
    config: MenzaClientConfig,
    client: reqwest::Client,
}

impl MenzaClient {
    pub fn new(config: MenzaClientConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("menza")
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}/v1/{}", self.api_base(), path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        match status.as_u16() {
            404 => return Err(FetchError::Unavailable(path.to_owned())),
            401 | 403 => return Err(FetchError::Unauthorized(format!("HTTP {status}"))),
            _ if !status.is_success() => {
                return Err(FetchError::Network(format!("HTTP {status} for {path}")));
            }
            _ => {}
        }

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(format!("{path}: {e}")))
    }

    /// Content hash of `resource`, optionally narrowed to one subsystem.
    pub async fn fingerprint(
        &self,
        language: &str,
        resource: &str,
        subsystem: Option<u32>,
    ) -> Result<Fingerprint, FetchError> {
        let path = match subsystem {
            Some(id) => format!("{language}/hash/{resource}?subsystem={id}"),
            None => format!("{language}/hash/{resource}"),
        };
        let response: HashDto = self.get_json(&path).await?;

        if response.hash.trim().is_empty() {
            return Err(FetchError::Malformed(format!("empty hash for {resource}")));
        }
        Ok(Fingerprint::new(response.hash))
    }

    pub async fn subsystems(&self, language: &str) -> Result<Vec<SubsystemDto>, FetchError> {
        self.get_json(&format!("{language}/subsystems")).await
    }

    pub async fn dishes(&self, language: &str, subsystem: u32) -> Result<Vec<DishDto>, FetchError> {
        self.get_json(&format!("{language}/subsystems/{subsystem}/dishes"))
            .await
    }

    pub async fn categories(
        &self,
        language: &str,
        subsystem: u32,
    ) -> Result<Vec<CategoryDto>, FetchError> {
        self.get_json(&format!("{language}/subsystems/{subsystem}/categories"))
            .await
    }

    pub async fn serving_places(
        &self,
        language: &str,
        subsystem: u32,
    ) -> Result<Vec<ServingPlaceDto>, FetchError> {
        self.get_json(&format!("{language}/subsystems/{subsystem}/serving-places"))
            .await
    }

    pub async fn pictograms(&self, language: &str) -> Result<Vec<PictogramDto>, FetchError> {
        self.get_json(&format!("{language}/pictograms")).await
    }

    pub async fn cafeteria_info(
        &self,
        language: &str,
        subsystem: u32,
    ) -> Result<CafeteriaInfoDto, FetchError> {
        self.get_json(&format!("{language}/subsystems/{subsystem}/info"))
            .await
    }

    pub async fn weeks(
        &self,
        language: &str,
        subsystem: u32,
    ) -> Result<Vec<WeekRefDto>, FetchError> {
        self.get_json(&format!("{language}/subsystems/{subsystem}/weeks"))
            .await
    }

    pub async fn week(
        &self,
        language: &str,
        subsystem: u32,
        week: u32,
    ) -> Result<WeekDto, FetchError> {
        self.get_json(&format!("{language}/subsystems/{subsystem}/weeks/{week}"))
            .await
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}
