//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::LatLng;

/// A geographic bounding box in EPSG:4326 degrees.
///
/// `x` is longitude and `y` is latitude, matching the axis order WMS 1.1.0
/// uses for `SRS=EPSG:4326`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build a box centered on `center` spanning the given extents in degrees.
    pub fn around(center: LatLng, lng_span: f64, lat_span: f64) -> Self {
        Self {
            min_x: center.lng - lng_span / 2.0,
            min_y: center.lat - lat_span / 2.0,
            max_x: center.lng + lng_span / 2.0,
            max_y: center.lat + lat_span / 2.0,
        }
    }

    /// Format as the WMS BBOX parameter ("west,south,east,north").
    pub fn to_wms_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}
