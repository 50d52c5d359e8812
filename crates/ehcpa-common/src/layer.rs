//! Layer definitions for the EHCPA map viewer.
//!
//! A [`LayerCatalog`] is the immutable, startup-time list of every overlay
//! the viewer knows about. It is either built in ([`LayerCatalog::ehcpa`])
//! or loaded from a YAML document with the same shape.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ViewerError, ViewerResult};

/// No-data value GeoServer reports for the monthly precipitation raster.
///
/// This is the `-9999.9` fill value after a round trip through `f32`.
pub const PTM_NO_DATA: f64 = -9999.900390625;

/// SPI accumulation scales published by the backend, in months.
pub const SPI_SCALES: [u32; 11] = [1, 2, 3, 6, 9, 12, 24, 36, 48, 60, 72];

/// Unique identifier for a layer, e.g. `PTM` or `SPI_12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(pub String);

impl LayerKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LayerKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a layer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Raster with a numeric value per pixel; point-queryable and downloadable.
    ContinuousValue,
    /// Outline/context layer; drawn only, never queried.
    Reference,
}

/// Switch group a layer belongs to. Each group has a master switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerGroup {
    Precipitation,
    Spi,
    Reference,
}

impl LayerGroup {
    pub fn all() -> &'static [LayerGroup] {
        &[LayerGroup::Precipitation, LayerGroup::Spi, LayerGroup::Reference]
    }

    pub fn parse(s: &str) -> ViewerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "precipitation" | "ptm" => Ok(LayerGroup::Precipitation),
            "spi" => Ok(LayerGroup::Spi),
            "reference" => Ok(LayerGroup::Reference),
            _ => Err(ViewerError::UnknownGroup(s.to_string())),
        }
    }
}

impl std::fmt::Display for LayerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerGroup::Precipitation => "precipitation",
            LayerGroup::Spi => "spi",
            LayerGroup::Reference => "reference",
        };
        f.write_str(name)
    }
}

fn default_opacity() -> f64 {
    1.0
}

/// Immutable description of one overlay layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Unique key used by switches, results and the download API
    pub key: LayerKey,

    /// Layer name on the WMS server (e.g. "EHCPA:PTM_Raster")
    pub server_layer_name: String,

    /// Label shown next to the value in the results panel
    pub label: String,

    pub kind: LayerKind,

    pub group: LayerGroup,

    /// Stacking order on the map
    pub z_index: i32,

    /// Whether the layer switch starts enabled
    #[serde(default)]
    pub default_enabled: bool,

    #[serde(default = "default_opacity")]
    pub default_opacity: f64,

    /// Sentinel value the server returns where the raster has no data
    #[serde(default)]
    pub no_data: Option<f64>,

    /// Overlay is only drawn at or above this zoom level
    #[serde(default)]
    pub min_zoom: Option<u8>,
}

impl LayerDescriptor {
    pub fn is_queryable(&self) -> bool {
        self.kind == LayerKind::ContinuousValue
    }

    /// Whether a raw feature value is this layer's no-data sentinel.
    pub fn is_no_data(&self, value: f64) -> bool {
        value.is_nan() || self.no_data.map_or(false, |sentinel| value == sentinel)
    }

    /// Whether the overlay should be drawn at the given zoom level.
    pub fn visible_at(&self, zoom: u8) -> bool {
        self.min_zoom.map_or(true, |min| zoom >= min)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    layers: Vec<LayerDescriptor>,
}

/// Ordered list of every layer the viewer can show.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCatalog {
    layers: Vec<LayerDescriptor>,
}

impl LayerCatalog {
    /// Build a catalog, rejecting duplicate keys.
    pub fn new(layers: Vec<LayerDescriptor>) -> ViewerResult<Self> {
        for (i, layer) in layers.iter().enumerate() {
            if layers[..i].iter().any(|l| l.key == layer.key) {
                return Err(ViewerError::DuplicateLayer(layer.key.to_string()));
            }
        }
        Ok(Self { layers })
    }

    /// The built-in EHCPA catalog for a GeoServer workspace (normally "EHCPA").
    pub fn ehcpa(workspace: &str) -> Self {
        let mut layers = Vec::with_capacity(1 + SPI_SCALES.len() + 7);

        layers.push(LayerDescriptor {
            key: LayerKey::new("PTM"),
            server_layer_name: format!("{}:PTM_Raster", workspace),
            label: "PTM [mm]".to_string(),
            kind: LayerKind::ContinuousValue,
            group: LayerGroup::Precipitation,
            z_index: 800,
            default_enabled: true,
            default_opacity: 1.0,
            no_data: Some(PTM_NO_DATA),
            min_zoom: None,
        });

        for scale in SPI_SCALES {
            layers.push(LayerDescriptor {
                key: LayerKey::new(format!("SPI_{}", scale)),
                server_layer_name: format!("{}:SPI_scale_{}_Raster", workspace, scale),
                label: format!("SPI Escala {}", scale),
                kind: LayerKind::ContinuousValue,
                group: LayerGroup::Spi,
                z_index: 1000,
                default_enabled: false,
                default_opacity: 1.0,
                no_data: None,
                min_zoom: None,
            });
        }

        let basins = [
            ("salsipuedes", "Cca_Salsipuedes", "Cuenca Salsipuedes"),
            ("sanAntonio", "Cca_San_Antonio", "Cuenca San Antonio"),
            ("cosquin", "Cca_Cosquin", "Cuenca Cosquín"),
            ("sanRoque", "Cca_San_Roque", "Cuenca San Roque"),
            ("losMolinos", "Cca_Los_Molinos", "Cuenca Los Molinos"),
            ("embalse", "Cca_Embalse", "Cuenca Embalse"),
        ];
        for (key, server_name, label) in basins {
            layers.push(reference_layer(workspace, key, server_name, label, Some(6)));
        }
        layers.push(reference_layer(
            workspace,
            "provincias",
            "Provincias",
            "Provincias",
            None,
        ));

        Self { layers }
    }

    /// Parse a catalog from YAML (`layers: [...]`).
    pub fn from_yaml_str(yaml: &str) -> ViewerResult<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.layers)
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ViewerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ViewerError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let catalog = Self::from_yaml_str(&content)?;
        info!(path = %path.display(), layers = catalog.len(), "Loaded layer catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter()
    }

    pub fn get(&self, key: &LayerKey) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|l| &l.key == key)
    }

    /// Like [`get`](Self::get) but with a typed error for unknown keys.
    pub fn require(&self, key: &LayerKey) -> ViewerResult<&LayerDescriptor> {
        self.get(key)
            .ok_or_else(|| ViewerError::UnknownLayer(key.to_string()))
    }

    /// Layers of one group, in catalog order.
    pub fn group(&self, group: LayerGroup) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter().filter(move |l| l.group == group)
    }
}

fn reference_layer(
    workspace: &str,
    key: &str,
    server_name: &str,
    label: &str,
    min_zoom: Option<u8>,
) -> LayerDescriptor {
    LayerDescriptor {
        key: LayerKey::new(key),
        server_layer_name: format!("{}:{}", workspace, server_name),
        label: label.to_string(),
        kind: LayerKind::Reference,
        group: LayerGroup::Reference,
        z_index: 2000,
        default_enabled: true,
        default_opacity: 1.0,
        no_data: None,
        min_zoom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        assert_eq!(catalog.group(LayerGroup::Precipitation).count(), 1);
        assert_eq!(catalog.group(LayerGroup::Spi).count(), 11);
        assert_eq!(catalog.group(LayerGroup::Reference).count(), 7);

        let ptm = catalog.get(&LayerKey::new("PTM")).unwrap();
        assert_eq!(ptm.server_layer_name, "EHCPA:PTM_Raster");
        assert!(ptm.default_enabled);
        assert_eq!(ptm.z_index, 800);

        let spi = catalog.get(&LayerKey::new("SPI_12")).unwrap();
        assert_eq!(spi.server_layer_name, "EHCPA:SPI_scale_12_Raster");
        assert_eq!(spi.label, "SPI Escala 12");
        assert!(!spi.default_enabled);
        assert!(spi.is_queryable());
    }

    #[test]
    fn test_no_data_policy() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let ptm = catalog.get(&LayerKey::new("PTM")).unwrap();
        assert!(ptm.is_no_data(-9999.900390625));
        assert!(!ptm.is_no_data(-9999.9));
        assert!(!ptm.is_no_data(12.5));

        let spi = catalog.get(&LayerKey::new("SPI_1")).unwrap();
        assert!(!spi.is_no_data(-9999.900390625));
        assert!(spi.is_no_data(f64::NAN));
    }

    #[test]
    fn test_basins_are_zoom_gated() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let basin = catalog.get(&LayerKey::new("cosquin")).unwrap();
        assert!(!basin.visible_at(5));
        assert!(basin.visible_at(6));
        let provinces = catalog.get(&LayerKey::new("provincias")).unwrap();
        assert!(provinces.visible_at(3));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let mut layers: Vec<_> = catalog.iter().cloned().collect();
        layers.push(layers[0].clone());
        assert!(matches!(
            LayerCatalog::new(layers),
            Err(ViewerError::DuplicateLayer(key)) if key == "PTM"
        ));
    }

    #[test]
    fn test_unknown_group() {
        assert_eq!(LayerGroup::parse("SPI").unwrap(), LayerGroup::Spi);
        assert!(LayerGroup::parse("temperature").is_err());
    }
}
