//! Search result types.

use ehcpa_common::LatLng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::GeocodeError;

/// One candidate place returned by the geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Full display name, e.g. "Córdoba, Pedanía Capital, Departamento Capital, ..."
    pub label: String,
    pub lat: f64,
    pub lng: f64,
    /// Administrative specificity; lower is broader
    pub place_rank: u32,
    /// Nominatim address type ("country", "state", "town", ...)
    pub address_type: String,
    /// Short place name
    pub name: String,
}

impl SearchResult {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// A place as Nominatim's `format=json` search returns it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NominatimPlace {
    pub display_name: String,
    #[serde(deserialize_with = "number_or_string")]
    pub lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub lon: f64,
    #[serde(default)]
    pub place_rank: u32,
    #[serde(default)]
    pub addresstype: String,
    #[serde(default)]
    pub name: String,
}

impl From<NominatimPlace> for SearchResult {
    fn from(place: NominatimPlace) -> Self {
        SearchResult {
            label: place.display_name,
            lat: place.lat,
            lng: place.lon,
            place_rank: place.place_rank,
            address_type: place.addresstype,
            name: place.name,
        }
    }
}

/// Parse a Nominatim search body into results, preserving server order.
pub fn parse_nominatim(body: &str) -> Result<Vec<SearchResult>, GeocodeError> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| GeocodeError::MalformedResponse(e.to_string()))?;
    Ok(places.into_iter().map(SearchResult::from).collect())
}

// Nominatim sends coordinates as strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coord {
        Number(f64),
        Text(String),
    }

    match Coord::deserialize(deserializer)? {
        Coord::Number(n) => Ok(n),
        Coord::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nominatim_body() {
        let body = r#"[{
            "place_id": 282964046,
            "lat": "-31.4166867",
            "lon": "-64.1834193",
            "display_name": "Córdoba, Municipio de Córdoba, Pedanía Capital, Departamento Capital, Córdoba, X5000, Argentina",
            "place_rank": 16,
            "addresstype": "city",
            "name": "Córdoba"
        }]"#;

        let results = parse_nominatim(body).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Córdoba");
        assert_eq!(results[0].place_rank, 16);
        assert_eq!(results[0].address_type, "city");
        test_utils::assert_coords_approx_eq!(
            (results[0].lat, results[0].lng),
            (-31.4166867, -64.1834193),
            1e-9
        );
    }

    #[test]
    fn test_parse_numeric_coordinates() {
        let body = r#"[{"lat": -34.6, "lon": -58.38, "display_name": "Buenos Aires"}]"#;
        let results = parse_nominatim(body).unwrap();
        assert_eq!(results[0].position(), LatLng::new(-34.6, -58.38));
        assert_eq!(results[0].place_rank, 0);
    }

    #[test]
    fn test_parse_rejects_bad_coordinate() {
        let body = r#"[{"lat": "north", "lon": "-58.38", "display_name": "x"}]"#;
        assert!(matches!(
            parse_nominatim(body),
            Err(GeocodeError::MalformedResponse(_))
        ));
    }
}
