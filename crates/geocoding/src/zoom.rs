//! Place-rank zoom heuristic.
//!
//! Nominatim's `place_rank` runs from 4 (country) to 30 (building). The map
//! flies to a zoom that frames the selected place: a whole province, a
//! town, a street. Ranks overlap between address types, so some bands are
//! refined by `addresstype`.

/// The one state-rank place that should be framed like a city.
pub const CAPITAL_DISTRICT: &str = "Ciudad Autónoma de Buenos Aires";

/// Target zoom for a selected place, or `None` to keep the current zoom.
pub fn zoom_for_place(place_rank: u32, address_type: &str, name: &str) -> Option<u8> {
    match place_rank {
        4 if address_type == "country" => Some(4),
        5..=9 if address_type == "state" => {
            if name == CAPITAL_DISTRICT {
                Some(10)
            } else {
                Some(6)
            }
        }
        // Departments share this band with counties; only counties zoom in further.
        10..=11 => match address_type {
            "county" => Some(12),
            _ => Some(10),
        },
        12..=16 => match address_type {
            "town" => Some(13),
            "village" => Some(15),
            _ => Some(12),
        },
        17..=18 => match address_type {
            "town" | "quarter" => Some(18),
            _ => Some(16),
        },
        19..=21 => match address_type {
            "suburb" => Some(17),
            "neighbourhood" => Some(18),
            _ => Some(16),
        },
        22 => match address_type {
            "military" | "residential" => Some(17),
            _ => Some(18),
        },
        23..=25 => Some(16),
        26.. => Some(18),
        _ => None,
    }
}
