//! Base-map tile addressing.
//!
//! The viewer draws its base map from a templated raster tile URL such as
//! `https://host/tms/1.0.0/layer@EPSG:3857@png/{z}/{x}/{-y}.png`. Tiles use
//! the Web Mercator XYZ scheme; `{-y}` requests the TMS (bottom-left origin)
//! row instead.

use serde::{Deserialize, Serialize};

use crate::{ViewerError, ViewerResult};

/// Latitude limit of the Web Mercator projection.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A tile coordinate (z/x/y) in the XYZ scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Row index in the TMS scheme (Y axis flipped).
    pub fn tms_y(&self) -> u32 {
        let n = 2u32.pow(self.z);
        n - 1 - self.y
    }
}

/// Convert lat/lon to Web Mercator tile coordinates.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = 2u32.pow(zoom);
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);

    let x = ((lon + 180.0) / 360.0 * n as f64).floor() as i64;
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n as f64).floor() as i64;

    let max = n as i64 - 1;
    TileCoord {
        z: zoom,
        x: x.clamp(0, max) as u32,
        y: y.clamp(0, max) as u32,
    }
}

/// A raster tile URL template with `{z}`, `{x}`, `{y}` or `{-y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileUrlTemplate(String);

impl TileUrlTemplate {
    pub fn parse(template: impl Into<String>) -> ViewerResult<Self> {
        let template = template.into();
        let has_row = template.contains("{y}") || template.contains("{-y}");
        if !template.contains("{z}") || !template.contains("{x}") || !has_row {
            return Err(ViewerError::Config(format!(
                "Tile URL template must contain {{z}}, {{x}} and {{y}} or {{-y}}: {}",
                template
            )));
        }
        Ok(Self(template))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expand the template for one tile.
    pub fn url_for(&self, tile: TileCoord) -> String {
        self.0
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{-y}", &tile.tms_y().to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

impl TryFrom<String> for TileUrlTemplate {
    type Error = ViewerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TileUrlTemplate> for String {
    fn from(t: TileUrlTemplate) -> Self {
        t.0
    }
}
