//! Headless core of the EHCPA map viewer.
//!
//! The viewer shows monthly precipitation (PTM) and SPI rasters served by
//! GeoServer over a base map of Argentina. This crate holds everything
//! except the drawing itself: the map widget sits behind [`MapSurface`],
//! and every other component is a state machine driven by explicit events
//! with async HTTP clients for GeoServer, Nominatim and the EHCPA backend.

pub mod config;
pub mod dates;
pub mod download;
pub mod hover;
pub mod panel;
pub mod query;
pub mod registry;
pub mod search;
pub mod state;
pub mod surface;

pub use config::ViewerConfig;
pub use dates::{DatesClient, DatesInfo};
pub use download::{DownloadAlert, DownloadError, DownloadStatus, DownloadTrigger};
pub use hover::{PointerGuard, UiElement};
pub use panel::{Clipboard, MemoryClipboard, PanelPosition, PanelRow, ResultPanel};
pub use query::{
    BatchOutcome, FeatureInfoSource, LayerOutcome, PointQueryCoordinator, QueryBatch, QueryTag,
    WmsFeatureInfoClient,
};
pub use registry::{LayerRegistry, LayerState};
pub use search::{LocationSearch, SearchSelection, SearchStatus};
pub use state::{Viewer, ViewerServices};
pub use surface::{HeadlessMap, MapClick, MapSurface, OverlayHandle, PendingView, Viewport};
