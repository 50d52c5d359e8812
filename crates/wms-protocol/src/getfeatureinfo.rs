//! WMS GetFeatureInfo requests and responses.
//!
//! The viewer asks GeoServer for the raster value under a clicked pixel with
//! a WMS 1.1.0 GetFeatureInfo request in `application/json` format and
//! reduces the answer to a [`PointValue`].

use ehcpa_common::{BoundingBox, LayerDescriptor, LayerKey, PixelPoint, PixelSize, ViewerError};
use serde::{Deserialize, Serialize};

/// Status text shown when a layer has no data at the queried point.
pub const NO_DATA_TEXT: &str = "S/D";

/// Response format requested from GeoServer; the only one the viewer parses.
pub const INFO_FORMAT: &str = "application/json";

/// GetFeatureInfo request for one layer at one clicked pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct GetFeatureInfoRequest {
    /// Server layer name, used for both LAYERS and QUERY_LAYERS
    pub layer: String,
    /// Current viewport extent in EPSG:4326
    pub bbox: BoundingBox,
    /// Viewport size in pixels
    pub size: PixelSize,
    /// Pixel column, 0-based from the left
    pub x: i64,
    /// Pixel row, 0-based from the top
    pub y: i64,
}

impl GetFeatureInfoRequest {
    /// Build a request from the viewport state at click time.
    ///
    /// The clicked container point is floored to whole pixels.
    pub fn new(
        layer: impl Into<String>,
        bbox: BoundingBox,
        size: PixelSize,
        point: PixelPoint,
    ) -> Self {
        let (x, y) = point.floor();
        Self {
            layer: layer.into(),
            bbox,
            size,
            x,
            y,
        }
    }

    /// Query parameters in the order GeoServer documents them.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WMS".to_string()),
            ("version", "1.1.0".to_string()),
            ("request", "GetFeatureInfo".to_string()),
            ("layers", self.layer.clone()),
            ("query_layers", self.layer.clone()),
            ("info_format", INFO_FORMAT.to_string()),
            ("bbox", self.bbox.to_wms_string()),
            ("width", self.size.width.to_string()),
            ("height", self.size.height.to_string()),
            ("srs", "EPSG:4326".to_string()),
            ("x", self.x.to_string()),
            ("y", self.y.to_string()),
        ]
    }

}

/// JSON body of a GetFeatureInfo response.
///
/// Only the raster band value is kept:
/// `{"features": [{"properties": {"GRAY_INDEX": 12.3}}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfoResponse {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Band value; `null` when GeoServer has no value for the pixel
    #[serde(rename = "GRAY_INDEX", default)]
    pub gray_index: Option<f64>,
}

impl FeatureInfoResponse {
    pub fn from_json(body: &str) -> Result<Self, ViewerError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Response carrying a single feature with the given value.
    pub fn single(value: Option<f64>) -> Self {
        Self {
            features: vec![Feature {
                properties: FeatureProperties { gray_index: value },
            }],
        }
    }

    /// Value of the first feature, if any feature was returned.
    pub fn first_value(&self) -> Option<Option<f64>> {
        self.features.first().map(|f| f.properties.gray_index)
    }
}

/// Outcome of querying one layer at one point.
///
/// A value and a status are mutually exclusive, so they share one enum.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    /// The raster holds a value at the point
    Value(f64),
    /// No feature, a null value or the layer's no-data sentinel
    NoData,
    /// The request failed; carries the text shown to the user
    Error(String),
}

impl PointValue {
    /// Error outcome for a failed query against `key`.
    pub fn query_failed(key: &LayerKey, err: &ViewerError) -> Self {
        PointValue::Error(format!(
            "Error al obtener el valor del raster para {}: {}",
            key, err
        ))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PointValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Status text for outcomes that carry no value.
    pub fn status_text(&self) -> Option<&str> {
        match self {
            PointValue::Value(_) => None,
            PointValue::NoData => Some(NO_DATA_TEXT),
            PointValue::Error(msg) => Some(msg),
        }
    }

    /// Text shown after the layer label: value to one decimal or the status.
    pub fn display(&self) -> String {
        match self {
            PointValue::Value(v) => format!("{:.1}", v),
            other => other.status_text().unwrap_or_default().to_string(),
        }
    }
}

/// Reduce a GetFeatureInfo response to a [`PointValue`] for `layer`.
pub fn classify_response(response: &FeatureInfoResponse, layer: &LayerDescriptor) -> PointValue {
    match response.first_value() {
        Some(Some(value)) if !layer.is_no_data(value) => PointValue::Value(value),
        _ => PointValue::NoData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehcpa_common::LayerCatalog;

    fn request() -> GetFeatureInfoRequest {
        GetFeatureInfoRequest::new(
            "EHCPA:PTM_Raster",
            BoundingBox::new(-68.0, -35.0, -58.0, -29.5),
            PixelSize::new(1280, 704),
            PixelPoint::new(640.6, 352.2),
        )
    }

    #[test]
    fn test_query_parameters() {
        let params = request().query_params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "service",
                "version",
                "request",
                "layers",
                "query_layers",
                "info_format",
                "bbox",
                "width",
                "height",
                "srs",
                "x",
                "y"
            ]
        );
        let value = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(value("request"), "GetFeatureInfo");
        assert_eq!(value("query_layers"), "EHCPA:PTM_Raster");
        assert_eq!(value("info_format"), "application/json");
        assert_eq!(value("bbox"), "-68,-35,-58,-29.5");
        assert_eq!(value("width"), "1280");
        assert_eq!(value("x"), "640");
        assert_eq!(value("y"), "352");
    }

    #[test]
    fn test_parse_geoserver_body() {
        let body = r#"{"type":"FeatureCollection","features":[{"type":"Feature","id":"",
            "geometry":null,"properties":{"GRAY_INDEX":87.4000015258789}}],
            "totalFeatures":"unknown","numberReturned":1,"crs":null}"#;
        let response = FeatureInfoResponse::from_json(body).unwrap();
        assert_eq!(response.first_value(), Some(Some(87.4000015258789)));
    }

    #[test]
    fn test_parse_rejects_non_numeric_value() {
        let body = r#"{"features":[{"properties":{"GRAY_INDEX":"abc"}}]}"#;
        assert!(matches!(
            FeatureInfoResponse::from_json(body),
            Err(ViewerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_classify_ptm() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let ptm = catalog.get(&LayerKey::new("PTM")).unwrap();

        let ok = classify_response(&FeatureInfoResponse::single(Some(42.27)), ptm);
        assert_eq!(ok, PointValue::Value(42.27));
        assert_eq!(ok.display(), "42.3");

        let sentinel = classify_response(&FeatureInfoResponse::single(Some(-9999.900390625)), ptm);
        assert_eq!(sentinel, PointValue::NoData);
        assert_eq!(sentinel.display(), "S/D");

        let empty = classify_response(&FeatureInfoResponse::default(), ptm);
        assert_eq!(empty, PointValue::NoData);
    }

    #[test]
    fn test_classify_spi_null_value() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let spi = catalog.get(&LayerKey::new("SPI_3")).unwrap();
        assert_eq!(
            classify_response(&FeatureInfoResponse::single(None), spi),
            PointValue::NoData
        );
        assert_eq!(
            classify_response(&FeatureInfoResponse::single(Some(-1.53)), spi),
            PointValue::Value(-1.53)
        );
    }

    #[test]
    fn test_query_failed_text() {
        let err = ViewerError::Transport("connection refused".to_string());
        let value = PointValue::query_failed(&LayerKey::new("SPI_6"), &err);
        assert_eq!(
            value.status_text(),
            Some("Error al obtener el valor del raster para SPI_6: HTTP request failed: connection refused")
        );
        assert_eq!(value.value(), None);
    }
}
