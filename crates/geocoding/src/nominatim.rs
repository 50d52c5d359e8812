//! Nominatim search client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::types::parse_nominatim;
use crate::{GeocodeError, SearchResult};

/// Trait for services that resolve free text to candidate places.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Search for places matching `query`, best match first.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, GeocodeError>;
}

/// Configuration for [`NominatimGeocoder`].
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Service root, e.g. "https://nominatim.openstreetmap.org"
    pub base_url: String,
    /// ISO 3166-1 country codes results are restricted to
    pub country_codes: String,
    /// Identifies the application, as Nominatim's usage policy requires
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            country_codes: "AR".to_string(),
            user_agent: concat!("ehcpa-viewer/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Geocoder backed by the Nominatim `/search` endpoint.
pub struct NominatimGeocoder {
    client: Client,
    config: NominatimConfig,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeocodeError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self), fields(countrycodes = %self.config.country_codes))]
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, GeocodeError> {
        let response = self
            .client
            .get(self.search_url())
            .query(&[
                ("format", "json"),
                ("q", query),
                ("countrycodes", self.config.country_codes.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Geocoder returned error status");
            return Err(GeocodeError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let results = parse_nominatim(&body)?;
        debug!(count = results.len(), "Geocoder search complete");
        Ok(results)
    }
}
