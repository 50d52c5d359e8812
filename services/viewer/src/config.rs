//! Viewer configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use ehcpa_common::{LayerCatalog, TileUrlTemplate, ViewerError, ViewerResult};
use tracing::info;

pub const DEFAULT_GEOSERVER_DATA_URL: &str = "http://localhost:8080/geoserver/EHCPA/wms";
pub const DEFAULT_DOWNLOAD_URL: &str = "http://127.0.0.1:5000/download";
pub const DEFAULT_DATES_URL: &str = "http://127.0.0.1:5000/get_dates";
pub const DEFAULT_BASE_TILE_URL: &str =
    "https://wms.ign.gob.ar/geoserver/gwc/service/tms/1.0.0/capabaseargenmap@EPSG%3A3857@png/{z}/{x}/{-y}.png";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// Endpoints and tunables for one viewer instance.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// GeoServer WMS endpoint for overlays and GetFeatureInfo
    pub geoserver_url: String,
    /// GeoServer workspace prefixed to built-in layer names
    pub geoserver_workspace: String,
    /// Backend download base; layer keys are appended as a path segment
    pub download_url: String,
    pub dates_url: String,
    pub base_tile_url: TileUrlTemplate,
    pub geocoder_url: String,
    pub geocoder_country_codes: String,
    pub search_debounce: Duration,
    pub http_timeout: Duration,
    /// Optional YAML catalog replacing the built-in layer list
    pub layer_catalog_file: Option<PathBuf>,
}

impl ViewerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> ViewerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> ViewerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let number = |name: &str, default: u64| -> ViewerResult<u64> {
            match lookup(name) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    ViewerError::Config(format!("{} must be a whole number, got {:?}", name, raw))
                }),
                None => Ok(default),
            }
        };

        let base_tile_url =
            TileUrlTemplate::parse(string("BASE_TILE_URL", DEFAULT_BASE_TILE_URL))?;

        Ok(Self {
            geoserver_url: string("GEOSERVER_DATA_URL", DEFAULT_GEOSERVER_DATA_URL),
            geoserver_workspace: string("GEOSERVER_WORKSPACE", "EHCPA"),
            download_url: string("BACKEND_DOWNLOAD_URL", DEFAULT_DOWNLOAD_URL),
            dates_url: string("BACKEND_GET_DATES_URL", DEFAULT_DATES_URL),
            base_tile_url,
            geocoder_url: string("GEOCODER_URL", DEFAULT_GEOCODER_URL),
            geocoder_country_codes: string("GEOCODER_COUNTRY_CODES", "AR"),
            search_debounce: Duration::from_millis(number("SEARCH_DEBOUNCE_MS", 1200)?),
            http_timeout: Duration::from_secs(number("HTTP_TIMEOUT_SECS", 30)?),
            layer_catalog_file: lookup("LAYER_CATALOG_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// The configured layer catalog, or the built-in one.
    pub fn load_catalog(&self) -> ViewerResult<LayerCatalog> {
        match &self.layer_catalog_file {
            Some(path) => LayerCatalog::load(path),
            None => {
                info!(workspace = %self.geoserver_workspace, "Using built-in layer catalog");
                Ok(LayerCatalog::ehcpa(&self.geoserver_workspace))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.geoserver_url, DEFAULT_GEOSERVER_DATA_URL);
        assert_eq!(config.download_url, DEFAULT_DOWNLOAD_URL);
        assert_eq!(config.geocoder_country_codes, "AR");
        assert_eq!(config.search_debounce, Duration::from_millis(1200));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.layer_catalog_file.is_none());
        assert_eq!(config.load_catalog().unwrap().len(), 19);
    }

    #[test]
    fn test_overrides() {
        let config = ViewerConfig::from_lookup(lookup(&[
            ("GEOSERVER_DATA_URL", "http://gs:8080/geoserver/EHCPA/wms"),
            ("SEARCH_DEBOUNCE_MS", "300"),
            ("BASE_TILE_URL", "https://tile.openstreetmap.org/{z}/{x}/{y}.png"),
            ("LAYER_CATALOG_FILE", ""),
        ]))
        .unwrap();
        assert_eq!(config.geoserver_url, "http://gs:8080/geoserver/EHCPA/wms");
        assert_eq!(config.search_debounce, Duration::from_millis(300));
        assert!(config.layer_catalog_file.is_none());
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = ViewerConfig::from_lookup(lookup(&[("HTTP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ViewerError::Config(msg) if msg.contains("HTTP_TIMEOUT_SECS")));
    }
}
