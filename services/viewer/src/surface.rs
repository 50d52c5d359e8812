//! Map surface abstraction.
//!
//! The mapping widget owns the viewport (center, zoom, pixel size) and the
//! drawn overlays. Components never reach for a global map: they receive a
//! `&mut dyn MapSurface` for every operation that touches the map.
//! [`HeadlessMap`] is the in-memory implementation used by the driver binary
//! and the tests.

use std::collections::HashMap;

use ehcpa_common::{BoundingBox, LatLng, PixelPoint, PixelSize};
use tracing::debug;
use wms_protocol::WmsOverlayParams;

/// Initial map center (Córdoba, Argentina).
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: -32.4135,
    lng: -63.18105,
};
pub const DEFAULT_ZOOM: u8 = 7;
pub const MIN_ZOOM: u8 = 3;
pub const MAX_ZOOM: u8 = 18;

/// Opaque reference to an overlay created on a map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(pub u64);

/// Visible extent and pixel size of the map container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: BoundingBox,
    pub size: PixelSize,
}

/// A click on the map canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapClick {
    pub latlng: LatLng,
    pub container_point: PixelPoint,
}

/// Operations the viewer needs from a mapping widget.
pub trait MapSurface {
    /// Materialize an overlay without adding it to the map.
    fn create_overlay(&mut self, params: &WmsOverlayParams) -> OverlayHandle;

    fn add_overlay(&mut self, handle: OverlayHandle);

    fn remove_overlay(&mut self, handle: OverlayHandle);

    /// Whether the overlay is currently on the map.
    fn has_overlay(&self, handle: OverlayHandle) -> bool;

    fn set_overlay_opacity(&mut self, handle: OverlayHandle, opacity: f64);

    fn viewport(&self) -> Viewport;

    fn zoom(&self) -> u8;

    fn center(&self) -> LatLng;

    /// Smoothly recenter; `None` keeps the current zoom.
    fn fly_to(&mut self, center: LatLng, zoom: Option<u8>);

    /// Place (or move) the search marker with a permanent tooltip.
    fn place_marker(&mut self, position: LatLng, tooltip: &str);
}

/// A recenter requested by search selection, applied once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingView {
    center: Option<LatLng>,
    zoom: Option<u8>,
}

impl PendingView {
    pub fn request(&mut self, center: LatLng, zoom: Option<u8>) {
        self.center = Some(center);
        self.zoom = zoom;
    }

    pub fn is_pending(&self) -> bool {
        self.center.is_some()
    }

    /// Fly to the pending view and clear it. Returns whether a transition ran.
    pub fn apply(&mut self, map: &mut dyn MapSurface) -> bool {
        match self.center.take() {
            Some(center) => {
                map.fly_to(center, self.zoom.take());
                true
            }
            None => false,
        }
    }
}

/// Overlay as recorded by [`HeadlessMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOverlay {
    pub params: WmsOverlayParams,
    pub opacity: f64,
    pub on_map: bool,
}

/// Search marker as recorded by [`HeadlessMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: LatLng,
    pub tooltip: String,
}

/// In-memory map surface with an equirectangular viewport.
#[derive(Debug, Clone)]
pub struct HeadlessMap {
    center: LatLng,
    zoom: u8,
    size: PixelSize,
    overlays: HashMap<OverlayHandle, HeadlessOverlay>,
    next_handle: u64,
    marker: Option<Marker>,
    transitions: u32,
}

impl HeadlessMap {
    pub fn new(size: PixelSize) -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            size,
            overlays: HashMap::new(),
            next_handle: 1,
            marker: None,
            transitions: 0,
        }
    }

    /// Jump without a transition, as a zoom/pan gesture would.
    pub fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.center = center;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn resize(&mut self, size: PixelSize) {
        self.size = size;
    }

    /// Click event for a geographic position.
    pub fn click_at(&self, latlng: LatLng) -> MapClick {
        let deg_per_px = self.degrees_per_pixel();
        let x = self.size.width as f64 / 2.0 + (latlng.lng - self.center.lng) / deg_per_px;
        let y = self.size.height as f64 / 2.0 - (latlng.lat - self.center.lat) / deg_per_px;
        MapClick {
            latlng,
            container_point: PixelPoint::new(x, y),
        }
    }

    // 256px tiles, 360 degrees of longitude across the world at zoom 0.
    fn degrees_per_pixel(&self) -> f64 {
        360.0 / (256.0 * 2f64.powi(self.zoom as i32))
    }

    pub fn overlay(&self, handle: OverlayHandle) -> Option<&HeadlessOverlay> {
        self.overlays.get(&handle)
    }

    /// Number of overlays ever created.
    pub fn overlays_created(&self) -> usize {
        self.overlays.len()
    }

    /// Server layer names currently drawn, sorted.
    pub fn visible_layers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .overlays
            .values()
            .filter(|o| o.on_map)
            .map(|o| o.params.layers.clone())
            .collect();
        names.sort();
        names
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    /// Number of `fly_to` transitions performed.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new(PixelSize::new(1280, 720))
    }
}

impl MapSurface for HeadlessMap {
    fn create_overlay(&mut self, params: &WmsOverlayParams) -> OverlayHandle {
        let handle = OverlayHandle(self.next_handle);
        self.next_handle += 1;
        self.overlays.insert(
            handle,
            HeadlessOverlay {
                params: params.clone(),
                opacity: params.opacity,
                on_map: false,
            },
        );
        debug!(layer = %params.layers, handle = handle.0, "Created overlay");
        handle
    }

    fn add_overlay(&mut self, handle: OverlayHandle) {
        if let Some(overlay) = self.overlays.get_mut(&handle) {
            overlay.on_map = true;
        }
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) {
        if let Some(overlay) = self.overlays.get_mut(&handle) {
            overlay.on_map = false;
        }
    }

    fn has_overlay(&self, handle: OverlayHandle) -> bool {
        self.overlays.get(&handle).map_or(false, |o| o.on_map)
    }

    fn set_overlay_opacity(&mut self, handle: OverlayHandle, opacity: f64) {
        if let Some(overlay) = self.overlays.get_mut(&handle) {
            overlay.opacity = opacity;
        }
    }

    fn viewport(&self) -> Viewport {
        let deg_per_px = self.degrees_per_pixel();
        let lng_span = deg_per_px * self.size.width as f64;
        let lat_span = deg_per_px * self.size.height as f64;
        Viewport {
            bounds: BoundingBox::around(self.center, lng_span, lat_span),
            size: self.size,
        }
    }

    fn zoom(&self) -> u8 {
        self.zoom
    }

    fn center(&self) -> LatLng {
        self.center
    }

    fn fly_to(&mut self, center: LatLng, zoom: Option<u8>) {
        self.center = center;
        if let Some(zoom) = zoom {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
        self.transitions += 1;
    }

    fn place_marker(&mut self, position: LatLng, tooltip: &str) {
        self.marker = Some(Marker {
            position,
            tooltip: tooltip.to_string(),
        });
    }
}
