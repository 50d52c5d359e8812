//! The viewer: every component wired to one map surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ehcpa_common::{LayerCatalog, LayerGroup, LayerKey, ViewerError, ViewerResult};
use futures::StreamExt;
use geocoding::{Geocoder, NominatimConfig, NominatimGeocoder};
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::dates::{DatesClient, DatesInfo};
use crate::download::{DownloadAlert, DownloadStatus, DownloadTrigger};
use crate::hover::{PointerGuard, UiElement};
use crate::panel::{Clipboard, PanelRow, ResultPanel};
use crate::query::{
    BatchOutcome, FeatureInfoSource, LayerOutcome, PointQueryCoordinator, QueryBatch,
    WmsFeatureInfoClient,
};
use crate::registry::LayerRegistry;
use crate::search::{LocationSearch, SearchSelection, SearchStatus};
use crate::surface::{MapClick, MapSurface, PendingView};

/// Remote services the viewer talks to.
pub struct ViewerServices {
    pub feature_info: Arc<dyn FeatureInfoSource>,
    pub geocoder: Arc<dyn Geocoder>,
    pub downloads: DownloadTrigger,
    pub dates: DatesClient,
}

pub struct Viewer<M: MapSurface> {
    map: M,
    registry: LayerRegistry,
    coordinator: PointQueryCoordinator,
    panel: ResultPanel,
    pointer: PointerGuard,
    search: LocationSearch,
    pending_view: PendingView,
    feature_info: Arc<dyn FeatureInfoSource>,
    downloads: DownloadTrigger,
    dates: DatesClient,
    alert: Option<DownloadAlert>,
}

impl<M: MapSurface> Viewer<M> {
    /// Build a viewer with HTTP clients for the configured services.
    pub fn from_config(config: &ViewerConfig, map: M) -> ViewerResult<Self> {
        let catalog = config.load_catalog()?;

        let feature_info = WmsFeatureInfoClient::new(&config.geoserver_url, config.http_timeout)?;
        let geocoder = NominatimGeocoder::new(NominatimConfig {
            base_url: config.geocoder_url.clone(),
            country_codes: config.geocoder_country_codes.clone(),
            timeout: config.http_timeout,
            ..Default::default()
        })
        .map_err(|e| ViewerError::Config(e.to_string()))?;
        let downloads = DownloadTrigger::new(&config.download_url, config.http_timeout)
            .map_err(|e| ViewerError::Config(e.to_string()))?;
        let dates = DatesClient::new(&config.dates_url, config.http_timeout)?;

        info!(
            geoserver = %config.geoserver_url,
            layers = catalog.len(),
            "Viewer configured"
        );

        Ok(Self::new(
            catalog,
            &config.geoserver_url,
            map,
            ViewerServices {
                feature_info: Arc::new(feature_info),
                geocoder: Arc::new(geocoder),
                downloads,
                dates,
            },
            config.search_debounce,
        ))
    }

    /// Wire the components and draw the default layers on `map`.
    pub fn new(
        catalog: LayerCatalog,
        wms_endpoint: &str,
        mut map: M,
        services: ViewerServices,
        search_debounce: Duration,
    ) -> Self {
        let mut registry = LayerRegistry::new(catalog, wms_endpoint);
        registry.attach(&mut map);

        Self {
            map,
            registry,
            coordinator: PointQueryCoordinator::new(),
            panel: ResultPanel::new(),
            pointer: PointerGuard::new(),
            search: LocationSearch::new(services.geocoder, search_debounce),
            pending_view: PendingView::default(),
            feature_info: services.feature_info,
            downloads: services.downloads,
            dates: services.dates,
            alert: None,
        }
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    /// Direct access for pan/zoom gestures; call [`zoom_ended`](Self::zoom_ended)
    /// after changing the zoom.
    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn panel(&self) -> &ResultPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut ResultPanel {
        &mut self.panel
    }

    pub fn pointer_mut(&mut self) -> &mut PointerGuard {
        &mut self.pointer
    }

    pub fn search(&self) -> &LocationSearch {
        &self.search
    }

    pub fn alert(&self) -> Option<&DownloadAlert> {
        self.alert.as_ref()
    }

    pub fn download_status(&self) -> DownloadStatus {
        self.downloads.status()
    }

    // === Layer menu ===

    pub fn set_layer_enabled(&mut self, key: &LayerKey, enabled: bool) -> ViewerResult<()> {
        self.registry.set_enabled(key, enabled, &mut self.map)
    }

    pub fn set_layer_opacity(&mut self, key: &LayerKey, opacity: f64) -> ViewerResult<()> {
        self.registry.set_opacity(key, opacity, &mut self.map)
    }

    pub fn set_group_enabled(&mut self, group: LayerGroup, enabled: bool) -> ViewerResult<()> {
        self.registry.set_group_enabled(group, enabled, &mut self.map)
    }

    /// The map finished a zoom gesture or transition.
    pub fn zoom_ended(&mut self) {
        let zoom = self.map.zoom();
        self.registry.sync_zoom(zoom, &mut self.map);
    }

    // === Map clicks and the results panel ===

    /// Handle a click: show the panel and prepare the point queries.
    ///
    /// Returns `None` when the pointer is over a UI element.
    pub fn click(&mut self, click: MapClick) -> Option<QueryBatch> {
        if self.pointer.is_over_ui() {
            debug!(position = %click.latlng, "Click over UI ignored");
            return None;
        }
        self.panel.show_at(click.latlng);
        let viewport = self.map.viewport();
        Some(self.coordinator.prepare(&click, &viewport, &mut self.registry))
    }

    /// Store a batch's results unless it was superseded.
    pub fn apply_results(&mut self, outcome: BatchOutcome) -> bool {
        self.coordinator.apply(outcome, &mut self.registry)
    }

    /// Store one layer's result unless its click was superseded.
    pub fn apply_layer_result(&mut self, outcome: LayerOutcome) -> bool {
        self.coordinator.apply_layer(outcome, &mut self.registry)
    }

    /// Click, query every enabled layer and store each result as it arrives.
    pub async fn click_and_query(&mut self, click: MapClick) -> bool {
        let Some(batch) = self.click(click) else {
            return false;
        };
        let source = Arc::clone(&self.feature_info);
        let mut results = batch.results(source.as_ref());
        let mut applied = true;
        while let Some(outcome) = results.next().await {
            applied &= self.apply_layer_result(outcome);
        }
        applied
    }

    /// Dismiss the panel; in-flight answers are dropped.
    pub fn close_panel(&mut self) {
        self.panel.close();
        self.pointer.clear();
        // An open alert still covers the map.
        if self.alert.is_some() {
            self.pointer.enter(UiElement::Alert);
        }
        self.coordinator.invalidate();
        self.registry.clear_results();
    }

    pub fn panel_rows(&self) -> Vec<PanelRow> {
        self.panel.rows(&self.registry)
    }

    pub fn copy_results(&mut self, clipboard: &mut dyn Clipboard) -> ViewerResult<bool> {
        self.panel.copy_to(&self.registry, clipboard)
    }

    // === Location search ===

    pub fn search_input(&mut self, text: &str) {
        self.search.set_text(text);
    }

    pub fn search_clear(&mut self) {
        self.search.clear();
    }

    pub async fn search_settled(&mut self) -> Option<SearchStatus> {
        self.search.settled().await
    }

    /// Select a search result: fly there and mark it.
    pub fn select_search_result(&mut self, index: usize) -> Option<SearchSelection> {
        let selection = self.search.select(index)?;
        self.pending_view.request(selection.position(), selection.zoom);
        self.pending_view.apply(&mut self.map);
        self.map
            .place_marker(selection.position(), &selection.result.label);
        self.zoom_ended();
        Some(selection)
    }

    // === Download and info ===

    /// Download the enabled value layers into `output_dir`.
    ///
    /// On failure the alert is kept until [`dismiss_alert`](Self::dismiss_alert)
    /// and blocks map clicks meanwhile.
    pub async fn download(&mut self, output_dir: &Path) -> Result<PathBuf, DownloadAlert> {
        let keys = self.registry.enabled_downloadable_keys();
        match self.downloads.download(&keys, output_dir).await {
            Ok(path) => Ok(path),
            Err(e) => {
                let alert = e.alert();
                self.alert = Some(alert.clone());
                self.pointer.enter(UiElement::Alert);
                Err(alert)
            }
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
        self.pointer.leave(UiElement::Alert);
    }

    pub async fn dates(&self) -> DatesInfo {
        self.dates.fetch().await
    }
}
