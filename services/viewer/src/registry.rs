//! Per-layer switch, opacity, overlay and result state.
//!
//! One [`LayerState`] exists per catalog entry. Overlays are created on the
//! map surface the first time a layer needs to be drawn and the handle is
//! kept for the registry's lifetime: switching a layer off removes the
//! overlay from the map but never destroys it.

use std::collections::HashMap;

use ehcpa_common::{LayerCatalog, LayerDescriptor, LayerGroup, LayerKey, ViewerResult};
use tracing::{debug, warn};
use wms_protocol::{PointValue, WmsOverlayParams};

use crate::surface::{MapSurface, OverlayHandle};

/// Mutable state of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerState {
    pub enabled: bool,
    /// Overlay opacity in [0, 1]
    pub opacity: f64,
    overlay: Option<OverlayHandle>,
    /// Outcome of the latest point query; `None` until queried or after reset
    pub result: Option<PointValue>,
}

impl LayerState {
    fn new(layer: &LayerDescriptor) -> Self {
        Self {
            enabled: layer.default_enabled,
            opacity: layer.default_opacity.clamp(0.0, 1.0),
            overlay: None,
            result: None,
        }
    }

    pub fn overlay(&self) -> Option<OverlayHandle> {
        self.overlay
    }
}

pub struct LayerRegistry {
    catalog: LayerCatalog,
    endpoint: String,
    states: HashMap<LayerKey, LayerState>,
    masters: HashMap<LayerGroup, bool>,
    zoom: u8,
}

impl LayerRegistry {
    /// Registry with every layer at its catalog defaults.
    ///
    /// `endpoint` is the WMS URL overlays are drawn from. Nothing touches
    /// the map until [`attach`](Self::attach).
    pub fn new(catalog: LayerCatalog, endpoint: impl Into<String>) -> Self {
        let states = catalog
            .iter()
            .map(|layer| (layer.key.clone(), LayerState::new(layer)))
            .collect();

        let masters = LayerGroup::all()
            .iter()
            .map(|&group| {
                let mut members = catalog.group(group).peekable();
                let on = members.peek().is_some() && members.all(|l| l.default_enabled);
                (group, on)
            })
            .collect();

        Self {
            catalog,
            endpoint: endpoint.into(),
            states,
            masters,
            zoom: 0,
        }
    }

    /// Draw the initially enabled layers on `map`.
    pub fn attach(&mut self, map: &mut dyn MapSurface) {
        self.zoom = map.zoom();
        let keys: Vec<LayerKey> = self.catalog.iter().map(|l| l.key.clone()).collect();
        for key in keys {
            self.reflect(&key, map);
        }
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    pub fn state(&self, key: &LayerKey) -> Option<&LayerState> {
        self.states.get(key)
    }

    pub fn is_enabled(&self, key: &LayerKey) -> bool {
        self.states.get(key).map_or(false, |s| s.enabled)
    }

    pub fn result(&self, key: &LayerKey) -> Option<&PointValue> {
        self.states.get(key).and_then(|s| s.result.as_ref())
    }

    /// Switch a layer on or off. Switching off clears its stored result.
    pub fn set_enabled(
        &mut self,
        key: &LayerKey,
        enabled: bool,
        map: &mut dyn MapSurface,
    ) -> ViewerResult<()> {
        self.catalog.require(key)?;
        if let Some(state) = self.states.get_mut(key) {
            state.enabled = enabled;
            if !enabled {
                state.result = None;
            }
        }
        self.reflect(key, map);
        debug!(layer = %key, enabled, "Layer switch changed");
        Ok(())
    }

    /// Set a layer's opacity, clamped to [0, 1]. NaN is ignored.
    pub fn set_opacity(
        &mut self,
        key: &LayerKey,
        opacity: f64,
        map: &mut dyn MapSurface,
    ) -> ViewerResult<()> {
        self.catalog.require(key)?;
        if opacity.is_nan() {
            warn!(layer = %key, "Ignoring NaN opacity");
            return Ok(());
        }
        if let Some(state) = self.states.get_mut(key) {
            state.opacity = opacity.clamp(0.0, 1.0);
            if let Some(handle) = state.overlay {
                map.set_overlay_opacity(handle, state.opacity);
            }
        }
        Ok(())
    }

    /// Opacity as the whole percentage shown next to the slider.
    pub fn opacity_percent(&self, key: &LayerKey) -> Option<u8> {
        self.states
            .get(key)
            .map(|s| (s.opacity * 100.0).round() as u8)
    }

    /// Master switch: set every layer of `group` to `enabled`.
    ///
    /// The master keeps the value it was last set to even if members are
    /// changed individually afterwards.
    pub fn set_group_enabled(
        &mut self,
        group: LayerGroup,
        enabled: bool,
        map: &mut dyn MapSurface,
    ) -> ViewerResult<()> {
        self.masters.insert(group, enabled);
        let keys: Vec<LayerKey> = self.catalog.group(group).map(|l| l.key.clone()).collect();
        for key in &keys {
            self.set_enabled(key, enabled, map)?;
        }
        debug!(%group, enabled, layers = keys.len(), "Group switch changed");
        Ok(())
    }

    pub fn group_enabled(&self, group: LayerGroup) -> bool {
        self.masters.get(&group).copied().unwrap_or(false)
    }

    /// Re-evaluate zoom-gated overlays after the map finished zooming.
    pub fn sync_zoom(&mut self, zoom: u8, map: &mut dyn MapSurface) {
        self.zoom = zoom;
        let gated: Vec<LayerKey> = self
            .catalog
            .iter()
            .filter(|l| l.min_zoom.is_some())
            .map(|l| l.key.clone())
            .collect();
        for key in gated {
            self.reflect(&key, map);
        }
    }

    /// Enabled layers that can be point-queried, in catalog order.
    pub fn enabled_queryable(&self) -> Vec<&LayerDescriptor> {
        self.catalog
            .iter()
            .filter(|l| l.is_queryable() && self.is_enabled(&l.key))
            .collect()
    }

    /// Keys sent to the download API: enabled value layers, catalog order.
    pub fn enabled_downloadable_keys(&self) -> Vec<LayerKey> {
        self.enabled_queryable()
            .into_iter()
            .map(|l| l.key.clone())
            .collect()
    }

    /// Store a query outcome. Ignored if the layer is off.
    pub fn record_result(&mut self, key: &LayerKey, value: PointValue) -> bool {
        match self.states.get_mut(key) {
            Some(state) if state.enabled => {
                state.result = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Reset stored results of the given layers.
    pub fn clear_results_for(&mut self, keys: &[LayerKey]) {
        for key in keys {
            if let Some(state) = self.states.get_mut(key) {
                state.result = None;
            }
        }
    }

    pub fn clear_results(&mut self) {
        for state in self.states.values_mut() {
            state.result = None;
        }
    }

    /// Bring the map in line with a layer's enabled flag and zoom gate.
    fn reflect(&mut self, key: &LayerKey, map: &mut dyn MapSurface) {
        let Some(layer) = self.catalog.get(key) else {
            return;
        };
        let Some(state) = self.states.get_mut(key) else {
            return;
        };

        let should_draw = state.enabled && layer.visible_at(self.zoom);
        if should_draw {
            let handle = match state.overlay {
                Some(handle) => handle,
                None => {
                    let params = WmsOverlayParams::for_layer(&self.endpoint, layer, state.opacity);
                    let handle = map.create_overlay(&params);
                    state.overlay = Some(handle);
                    handle
                }
            };
            if !map.has_overlay(handle) {
                map.set_overlay_opacity(handle, state.opacity);
                map.add_overlay(handle);
            }
        } else if let Some(handle) = state.overlay {
            if map.has_overlay(handle) {
                map.remove_overlay(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessMap;

    fn registry() -> (LayerRegistry, HeadlessMap) {
        let mut map = HeadlessMap::default();
        let mut registry = LayerRegistry::new(LayerCatalog::ehcpa("EHCPA"), "http://gs/wms");
        registry.attach(&mut map);
        (registry, map)
    }

    #[test]
    fn test_defaults_on_attach() {
        let (registry, map) = registry();
        assert!(registry.is_enabled(&LayerKey::new("PTM")));
        assert!(!registry.is_enabled(&LayerKey::new("SPI_1")));
        assert!(registry.group_enabled(LayerGroup::Precipitation));
        assert!(!registry.group_enabled(LayerGroup::Spi));
        assert!(registry.group_enabled(LayerGroup::Reference));

        // Zoom 7: PTM, provinces and the six basins.
        assert_eq!(map.visible_layers().len(), 8);
        assert!(map
            .visible_layers()
            .contains(&"EHCPA:PTM_Raster".to_string()));
    }

    #[test]
    fn test_overlay_created_lazily() {
        let (mut registry, mut map) = registry();
        let spi = LayerKey::new("SPI_6");
        assert!(registry.state(&spi).unwrap().overlay().is_none());
        registry.set_enabled(&spi, true, &mut map).unwrap();
        assert!(registry.state(&spi).unwrap().overlay().is_some());
    }

    #[test]
    fn test_opacity_clamped_and_percent() {
        let (mut registry, mut map) = registry();
        let ptm = LayerKey::new("PTM");
        registry.set_opacity(&ptm, 1.7, &mut map).unwrap();
        assert_eq!(registry.opacity_percent(&ptm), Some(100));
        registry.set_opacity(&ptm, -0.2, &mut map).unwrap();
        assert_eq!(registry.opacity_percent(&ptm), Some(0));
        registry.set_opacity(&ptm, 0.3, &mut map).unwrap();
        assert_eq!(registry.opacity_percent(&ptm), Some(30));
        registry.set_opacity(&ptm, f64::NAN, &mut map).unwrap();
        assert_eq!(registry.opacity_percent(&ptm), Some(30));

        let handle = registry.state(&ptm).unwrap().overlay().unwrap();
        assert_eq!(map.overlay(handle).unwrap().opacity, 0.3);
    }

    #[test]
    fn test_unknown_layer() {
        let (mut registry, mut map) = registry();
        assert!(registry
            .set_enabled(&LayerKey::new("SPI_5"), true, &mut map)
            .is_err());
    }

    #[test]
    fn test_record_result_ignored_when_off() {
        let (mut registry, _) = registry();
        assert!(!registry.record_result(&LayerKey::new("SPI_1"), PointValue::Value(1.0)));
        assert!(registry.record_result(&LayerKey::new("PTM"), PointValue::NoData));
        assert_eq!(
            registry.result(&LayerKey::new("PTM")),
            Some(&PointValue::NoData)
        );
    }

    #[test]
    fn test_download_keys_exclude_reference() {
        let (mut registry, mut map) = registry();
        registry
            .set_enabled(&LayerKey::new("SPI_12"), true, &mut map)
            .unwrap();
        registry
            .set_enabled(&LayerKey::new("SPI_1"), true, &mut map)
            .unwrap();
        let keys: Vec<String> = registry
            .enabled_downloadable_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["PTM", "SPI_1", "SPI_12"]);
    }
}
