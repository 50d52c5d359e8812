//! Free-text place search for the map viewer.
//!
//! - [`Geocoder`]: the search seam, implemented over HTTP by
//!   [`NominatimGeocoder`].
//! - [`SearchResult`]: one candidate place.
//! - [`zoom_for_place`]: the place-rank heuristic that picks the zoom level
//!   the map flies to when a candidate is selected.

pub mod error;
pub mod nominatim;
pub mod types;
pub mod zoom;

pub use error::GeocodeError;
pub use nominatim::{Geocoder, NominatimConfig, NominatimGeocoder};
pub use types::SearchResult;
pub use zoom::zoom_for_place;
