//! Common types shared across the EHCPA viewer crates.

pub mod bbox;
pub mod error;
pub mod geo;
pub mod layer;
pub mod tile;

pub use bbox::BoundingBox;
pub use error::{ViewerError, ViewerResult};
pub use geo::{LatLng, PixelPoint, PixelSize};
pub use layer::{LayerCatalog, LayerDescriptor, LayerGroup, LayerKey, LayerKind};
pub use tile::{TileCoord, TileUrlTemplate};
