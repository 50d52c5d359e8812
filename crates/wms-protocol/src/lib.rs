//! Client side of the OGC WMS 1.1.0 operations the viewer uses.
//!
//! - GetMap overlays (`getmap`): parameters for drawing a server layer.
//! - GetFeatureInfo (`getfeatureinfo`): querying the raster value under a
//!   clicked pixel and classifying the answer.

pub mod getfeatureinfo;
pub mod getmap;

pub use getfeatureinfo::{
    classify_response, FeatureInfoResponse, GetFeatureInfoRequest, PointValue, INFO_FORMAT,
    NO_DATA_TEXT,
};
pub use getmap::WmsOverlayParams;
