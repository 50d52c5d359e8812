//! Data currency dates shown in the info panel.

use std::time::Duration;

use ehcpa_common::{ViewerError, ViewerResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Placeholder shown for every date when the backend cannot be reached.
pub const UNAVAILABLE: &str = "No_Disponible";

/// Display strings from the backend's dates endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatesInfo {
    pub today_day: String,
    pub today_month: String,
    pub today_year: String,
    /// Date of the most recent raster band
    pub last_band_day: String,
    pub last_band_month: String,
    pub last_band_year: String,
    pub calibration_date: String,
}

impl DatesInfo {
    pub fn unavailable() -> Self {
        Self {
            today_day: UNAVAILABLE.to_string(),
            today_month: UNAVAILABLE.to_string(),
            today_year: UNAVAILABLE.to_string(),
            last_band_day: UNAVAILABLE.to_string(),
            last_band_month: UNAVAILABLE.to_string(),
            last_band_year: UNAVAILABLE.to_string(),
            calibration_date: UNAVAILABLE.to_string(),
        }
    }
}

pub struct DatesClient {
    client: Client,
    url: String,
}

impl DatesClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ViewerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ViewerError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Fetch the dates, or placeholders on any failure.
    pub async fn fetch(&self) -> DatesInfo {
        match self.try_fetch().await {
            Ok(dates) => dates,
            Err(e) => {
                warn!(error = %e, "Dates unavailable");
                DatesInfo::unavailable()
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn try_fetch(&self) -> ViewerResult<DatesInfo> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ViewerError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ViewerError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ViewerError::HttpStatus {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
