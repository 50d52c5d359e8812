//! Common test fixtures for EHCPA viewer tests.
//!
//! Response bodies here mirror what GeoServer, Nominatim and the EHCPA
//! backend actually send, trimmed to the fields the viewer reads.

use serde_json::{json, Value};

/// No-data value GeoServer reports for the PTM raster.
pub const PTM_NO_DATA: f64 = -9999.900390625;

/// GetFeatureInfo body with one feature carrying `value` (or `null`).
pub fn feature_info_json(value: Option<f64>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "id": "",
            "geometry": null,
            "properties": { "GRAY_INDEX": value }
        }],
        "totalFeatures": "unknown",
        "numberReturned": 1,
        "timeStamp": "2024-10-01T12:00:00.000Z",
        "crs": null
    })
}

/// GetFeatureInfo body for a click outside the raster.
pub fn empty_feature_info_json() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [],
        "totalFeatures": "unknown",
        "numberReturned": 0,
        "crs": null
    })
}

/// One Nominatim search hit.
pub fn nominatim_place(
    display_name: &str,
    name: &str,
    lat: f64,
    lon: f64,
    place_rank: u32,
    addresstype: &str,
) -> Value {
    json!({
        "place_id": 1,
        "licence": "Data © OpenStreetMap contributors, ODbL 1.0. http://osm.org/copyright",
        "osm_type": "relation",
        "lat": lat.to_string(),
        "lon": lon.to_string(),
        "class": "boundary",
        "type": "administrative",
        "place_rank": place_rank,
        "addresstype": addresstype,
        "name": name,
        "display_name": display_name,
    })
}

/// Nominatim hits for "Cordoba, Argentina".
pub fn cordoba_places() -> Vec<Value> {
    vec![
        nominatim_place(
            "Córdoba, Municipio de Córdoba, Pedanía Capital, Departamento Capital, Córdoba, X5000, Argentina",
            "Córdoba",
            -31.4166867,
            -64.1834193,
            16,
            "city",
        ),
        nominatim_place(
            "Córdoba, Argentina",
            "Córdoba",
            -31.2884408,
            -64.1138212,
            8,
            "state",
        ),
    ]
}

/// Body of the backend's dates endpoint.
pub fn dates_json() -> Value {
    json!({
        "today_day": "15",
        "today_month": "Octubre",
        "today_year": "2024",
        "last_band_day": "30",
        "last_band_month": "Septiembre",
        "last_band_year": "2024",
        "calibration_date": "Septiembre 2024"
    })
}
