//! WMS overlay parameters.
//!
//! An overlay is a server layer drawn on top of the base map through
//! GetMap requests. The map surface receives these parameters once, when it
//! materializes the overlay.

use ehcpa_common::{BoundingBox, LayerDescriptor, PixelSize};
use serde::{Deserialize, Serialize};

/// Construction parameters for one WMS overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmsOverlayParams {
    /// WMS endpoint URL
    pub endpoint: String,
    /// Server layer name
    pub layers: String,
    /// Image format
    pub format: String,
    pub transparent: bool,
    /// Initial opacity in [0, 1]
    pub opacity: f64,
    pub z_index: i32,
}

impl WmsOverlayParams {
    /// Parameters for drawing `layer` from `endpoint` at the given opacity.
    pub fn for_layer(endpoint: &str, layer: &LayerDescriptor, opacity: f64) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            layers: layer.server_layer_name.clone(),
            format: "image/png".to_string(),
            transparent: true,
            opacity,
            z_index: layer.z_index,
        }
    }

    /// GetMap URL for one image covering `bbox` at `size` pixels.
    pub fn get_map_url(&self, bbox: &BoundingBox, size: PixelSize) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}service=WMS&version=1.1.0&request=GetMap&layers={}&styles=&format={}\
             &transparent={}&srs=EPSG:4326&bbox={}&width={}&height={}",
            self.endpoint,
            sep,
            self.layers,
            self.format,
            self.transparent,
            bbox.to_wms_string(),
            size.width,
            size.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehcpa_common::{LayerCatalog, LayerKey};

    #[test]
    fn test_overlay_params_from_descriptor() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let spi = catalog.get(&LayerKey::new("SPI_24")).unwrap();
        let params = WmsOverlayParams::for_layer("http://gs/wms", spi, 0.7);

        assert_eq!(params.layers, "EHCPA:SPI_scale_24_Raster");
        assert_eq!(params.format, "image/png");
        assert_eq!(params.z_index, 1000);
        assert_eq!(params.opacity, 0.7);
    }

    #[test]
    fn test_get_map_url() {
        let catalog = LayerCatalog::ehcpa("EHCPA");
        let ptm = catalog.get(&LayerKey::new("PTM")).unwrap();
        let params = WmsOverlayParams::for_layer("http://gs/wms", ptm, 1.0);
        let url = params.get_map_url(&BoundingBox::new(-70.0, -40.0, -60.0, -30.0), PixelSize::new(256, 256));

        assert!(url.starts_with("http://gs/wms?service=WMS&version=1.1.0&request=GetMap"));
        assert!(url.contains("layers=EHCPA:PTM_Raster"));
        assert!(url.contains("bbox=-70,-40,-60,-30"));
        assert!(url.ends_with("width=256&height=256"));
    }
}
