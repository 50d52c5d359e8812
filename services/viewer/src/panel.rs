//! Draggable results panel.
//!
//! Shows the last clicked coordinates and, for every enabled value layer,
//! its latest value or status. Dragging is clamped to the map container
//! with a reserved band at the top for the page header. Moves are visual
//! until the drag ends, when the position is committed.

use std::time::Duration;

use ehcpa_common::{LatLng, LayerDescriptor, PixelSize, ViewerResult};
use tokio::time::Instant;
use tracing::debug;

use crate::registry::LayerRegistry;

/// Height reserved above the panel's top edge for the page header.
pub const HEADER_RESERVE: f64 = 90.0;

/// Panel size assumed until the real one is measured.
pub const DEFAULT_PANEL_SIZE: (f64, f64) = (510.0, 307.0);

/// How long the "copied" confirmation stays visible.
pub const COPY_CONFIRMATION: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelPosition {
    pub x: f64,
    pub y: f64,
}

impl PanelPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One "<label>: <text>" line of the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub label: String,
    pub text: String,
}

impl std::fmt::Display for PanelRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label, self.text)
    }
}

/// Destination of the copy action.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> ViewerResult<()>;
}

/// Clipboard that keeps the last written text.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    pub contents: Option<String>,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> ViewerResult<()> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

#[derive(Debug)]
pub struct ResultPanel {
    visible: bool,
    coordinates: Option<LatLng>,
    committed: PanelPosition,
    position: PanelPosition,
    width: f64,
    height: f64,
    dragging: bool,
    copied_until: Option<Instant>,
}

impl Default for ResultPanel {
    fn default() -> Self {
        let start = PanelPosition::new(58.0, 104.0);
        Self {
            visible: false,
            coordinates: None,
            committed: start,
            position: start,
            width: DEFAULT_PANEL_SIZE.0,
            height: DEFAULT_PANEL_SIZE.1,
            dragging: false,
            copied_until: None,
        }
    }
}

impl ResultPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn coordinates(&self) -> Option<LatLng> {
        self.coordinates
    }

    /// Show the panel for a new click.
    pub fn show_at(&mut self, coordinates: LatLng) {
        self.visible = true;
        self.coordinates = Some(coordinates);
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.coordinates = None;
        self.dragging = false;
        self.position = self.committed;
    }

    /// Rendered position.
    pub fn position(&self) -> PanelPosition {
        self.position
    }

    /// Record the measured panel size.
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    /// Move by the pointer delta since the drag started.
    pub fn drag_by(&mut self, dx: f64, dy: f64, container: PixelSize) -> PanelPosition {
        if !self.dragging {
            return self.position;
        }
        self.position = self.clamp(
            PanelPosition::new(self.committed.x + dx, self.committed.y + dy),
            container,
        );
        self.position
    }

    pub fn end_drag(&mut self) {
        if self.dragging {
            self.dragging = false;
            self.committed = self.position;
            debug!(x = self.committed.x, y = self.committed.y, "Panel position committed");
        }
    }

    /// Keep the panel inside the container and below the header band.
    ///
    /// A container smaller than the panel pins it to the top-left limit.
    pub fn clamp(&self, to: PanelPosition, container: PixelSize) -> PanelPosition {
        let max_x = container.width as f64 - self.width;
        let max_y = container.height as f64 - self.height;
        PanelPosition::new(
            to.x.min(max_x).max(0.0),
            to.y.min(max_y).max(HEADER_RESERVE),
        )
    }

    /// "Latitud: <lat> - Longitud: <lng>" as shown in the panel header.
    pub fn coordinates_text(&self) -> Option<String> {
        self.coordinates
            .map(|c| format!("Latitud: {:.3} - Longitud: {:.3}", c.lat, c.lng))
    }

    /// One row per enabled value layer holding a result.
    pub fn rows(&self, registry: &LayerRegistry) -> Vec<PanelRow> {
        registry
            .enabled_queryable()
            .into_iter()
            .filter_map(|layer: &LayerDescriptor| {
                registry.result(&layer.key).map(|value| PanelRow {
                    label: layer.label.clone(),
                    text: value.display(),
                })
            })
            .collect()
    }

    /// Whether no enabled layer holds a value or status yet.
    pub fn is_values_empty(&self, registry: &LayerRegistry) -> bool {
        self.rows(registry).is_empty()
    }

    /// Text block put on the clipboard by the copy action.
    pub fn copy_text(&self, registry: &LayerRegistry) -> Option<String> {
        let c = self.coordinates?;
        let mut text = format!("Latitud: {:.3}, Longitud: {:.3}\n", c.lat, c.lng);
        for row in self.rows(registry) {
            text.push_str(&row.to_string());
            text.push('\n');
        }
        Some(text)
    }

    /// Copy all values and start the confirmation timer.
    pub fn copy_to(
        &mut self,
        registry: &LayerRegistry,
        clipboard: &mut dyn Clipboard,
    ) -> ViewerResult<bool> {
        let Some(text) = self.copy_text(registry) else {
            return Ok(false);
        };
        clipboard.write_text(&text)?;
        self.copied_until = Some(Instant::now() + COPY_CONFIRMATION);
        Ok(true)
    }

    /// Whether the "copied" confirmation is still showing.
    pub fn is_copy_confirmed(&self) -> bool {
        self.copied_until
            .map_or(false, |until| Instant::now() < until)
    }
}
