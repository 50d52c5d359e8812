//! Point queries: the raster values under a map click.
//!
//! A click becomes a [`QueryBatch`] holding one GetFeatureInfo request per
//! enabled value layer. The batch runs all requests concurrently, either
//! yielding each [`LayerOutcome`] as soon as its layer answers or one
//! [`BatchOutcome`] once all have. Outcomes are written back to the registry
//! only if no newer click (or panel close) happened in the meantime.

use std::time::Duration;

use async_trait::async_trait;
use ehcpa_common::{LayerDescriptor, LayerKey, LatLng, ViewerError, ViewerResult};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, Stream};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use wms_protocol::{classify_response, FeatureInfoResponse, GetFeatureInfoRequest, PointValue};

use crate::registry::LayerRegistry;
use crate::surface::{MapClick, Viewport};

/// Source of GetFeatureInfo answers.
#[async_trait]
pub trait FeatureInfoSource: Send + Sync {
    async fn feature_info(&self, request: &GetFeatureInfoRequest)
        -> ViewerResult<FeatureInfoResponse>;
}

/// GetFeatureInfo over HTTP against a GeoServer WMS endpoint.
pub struct WmsFeatureInfoClient {
    client: Client,
    endpoint: String,
}

impl WmsFeatureInfoClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ViewerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ViewerError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl FeatureInfoSource for WmsFeatureInfoClient {
    #[instrument(skip(self, request), fields(layer = %request.layer, x = request.x, y = request.y))]
    async fn feature_info(
        &self,
        request: &GetFeatureInfoRequest,
    ) -> ViewerResult<FeatureInfoResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&request.query_params())
            .send()
            .await
            .map_err(|e| ViewerError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ViewerError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ViewerError::HttpStatus {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        FeatureInfoResponse::from_json(&body)
    }
}

/// Identity of one click's queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryTag {
    pub seq: u64,
    pub position: LatLng,
}

/// Requests prepared for one click, not yet sent.
#[derive(Debug, Clone)]
pub struct QueryBatch {
    pub tag: QueryTag,
    queries: Vec<(LayerDescriptor, GetFeatureInfoRequest)>,
}

impl QueryBatch {
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn requests(&self) -> impl Iterator<Item = &GetFeatureInfoRequest> {
        self.queries.iter().map(|(_, request)| request)
    }

    /// Send every request concurrently and yield each classified answer as
    /// it arrives, fastest layer first.
    pub fn results<'a>(
        self,
        source: &'a dyn FeatureInfoSource,
    ) -> impl Stream<Item = LayerOutcome> + Unpin + 'a {
        let tag = self.tag;
        self.queries
            .into_iter()
            .map(|(layer, request)| async move {
                let (key, value) = query_layer(source, layer, request).await;
                LayerOutcome { tag, key, value }
            })
            .collect::<FuturesUnordered<_>>()
    }

    /// Send every request concurrently and classify the answers once all
    /// have arrived.
    pub async fn execute(self, source: &dyn FeatureInfoSource) -> BatchOutcome {
        let tag = self.tag;
        let futures = self
            .queries
            .into_iter()
            .map(|(layer, request)| query_layer(source, layer, request));

        BatchOutcome {
            tag,
            results: join_all(futures).await,
        }
    }
}

async fn query_layer(
    source: &dyn FeatureInfoSource,
    layer: LayerDescriptor,
    request: GetFeatureInfoRequest,
) -> (LayerKey, PointValue) {
    let value = match source.feature_info(&request).await {
        Ok(response) => classify_response(&response, &layer),
        Err(e) => {
            warn!(layer = %layer.key, error = %e, "Point query failed");
            PointValue::query_failed(&layer.key, &e)
        }
    };
    (layer.key, value)
}

/// Classified answer for one layer of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOutcome {
    pub tag: QueryTag,
    pub key: LayerKey,
    pub value: PointValue,
}

/// Classified answers for one batch, in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub tag: QueryTag,
    pub results: Vec<(LayerKey, PointValue)>,
}

/// Issues point queries and discards answers that arrive too late.
#[derive(Debug, Default)]
pub struct PointQueryCoordinator {
    seq: u64,
    current: Option<QueryTag>,
}

impl PointQueryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag of the click whose answers are currently wanted.
    pub fn current(&self) -> Option<QueryTag> {
        self.current
    }

    /// Build the requests for a click against the viewport at click time.
    ///
    /// Results of the layers being queried are reset so the panel never
    /// pairs new coordinates with old values.
    pub fn prepare(
        &mut self,
        click: &MapClick,
        viewport: &Viewport,
        registry: &mut LayerRegistry,
    ) -> QueryBatch {
        self.seq += 1;
        let tag = QueryTag {
            seq: self.seq,
            position: click.latlng,
        };
        self.current = Some(tag);

        let queries: Vec<(LayerDescriptor, GetFeatureInfoRequest)> = registry
            .enabled_queryable()
            .into_iter()
            .map(|layer| {
                let request = GetFeatureInfoRequest::new(
                    layer.server_layer_name.clone(),
                    viewport.bounds,
                    viewport.size,
                    click.container_point,
                );
                (layer.clone(), request)
            })
            .collect();

        let keys: Vec<LayerKey> = queries.iter().map(|(l, _)| l.key.clone()).collect();
        registry.clear_results_for(&keys);

        debug!(seq = tag.seq, position = %tag.position, layers = queries.len(), "Prepared point query");
        QueryBatch { tag, queries }
    }

    /// Drop any in-flight batch.
    pub fn invalidate(&mut self) {
        self.seq += 1;
        self.current = None;
    }

    /// Store a batch's results unless a newer click superseded it.
    ///
    /// Results for layers switched off after the click are dropped.
    /// Returns whether the outcome was applied.
    pub fn apply(&self, outcome: BatchOutcome, registry: &mut LayerRegistry) -> bool {
        if self.current.map(|t| t.seq) != Some(outcome.tag.seq) {
            debug!(seq = outcome.tag.seq, current = self.seq, "Discarding stale point query results");
            return false;
        }

        for (key, value) in outcome.results {
            record(registry, &key, value);
        }
        true
    }

    /// Store one layer's answer unless a newer click superseded its batch.
    pub fn apply_layer(&self, outcome: LayerOutcome, registry: &mut LayerRegistry) -> bool {
        if self.current.map(|t| t.seq) != Some(outcome.tag.seq) {
            debug!(seq = outcome.tag.seq, layer = %outcome.key, "Discarding stale layer result");
            return false;
        }
        record(registry, &outcome.key, outcome.value);
        true
    }
}

fn record(registry: &mut LayerRegistry, key: &LayerKey, value: PointValue) {
    if !registry.record_result(key, value) {
        debug!(layer = %key, "Layer switched off before its result arrived");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{HeadlessMap, MapSurface};
    use ehcpa_common::LayerCatalog;
    use std::collections::HashMap;

    /// Answers from a fixed table keyed by server layer name.
    struct StaticSource(HashMap<String, ViewerResult<Option<f64>>>);

    #[async_trait]
    impl FeatureInfoSource for StaticSource {
        async fn feature_info(
            &self,
            request: &GetFeatureInfoRequest,
        ) -> ViewerResult<FeatureInfoResponse> {
            match self.0.get(&request.layer) {
                Some(Ok(value)) => Ok(FeatureInfoResponse::single(*value)),
                Some(Err(e)) => Err(ViewerError::Transport(e.to_string())),
                None => Ok(FeatureInfoResponse::default()),
            }
        }
    }

    fn setup() -> (LayerRegistry, HeadlessMap, PointQueryCoordinator) {
        let mut map = HeadlessMap::default();
        let mut registry = LayerRegistry::new(LayerCatalog::ehcpa("EHCPA"), "http://gs/wms");
        registry.attach(&mut map);
        (registry, map, PointQueryCoordinator::new())
    }

    #[tokio::test]
    async fn test_batch_covers_enabled_value_layers_only() {
        let (mut registry, mut map, mut coordinator) = setup();
        registry
            .set_enabled(&LayerKey::new("SPI_3"), true, &mut map)
            .unwrap();

        let click = map.click_at(map.center());
        let batch = coordinator.prepare(&click, &map.viewport(), &mut registry);
        let layers: Vec<&str> = batch.requests().map(|r| r.layer.as_str()).collect();
        assert_eq!(layers, vec!["EHCPA:PTM_Raster", "EHCPA:SPI_scale_3_Raster"]);
    }

    #[tokio::test]
    async fn test_outcome_classified_per_layer() {
        let (mut registry, mut map, mut coordinator) = setup();
        registry
            .set_enabled(&LayerKey::new("SPI_3"), true, &mut map)
            .unwrap();
        registry
            .set_enabled(&LayerKey::new("SPI_6"), true, &mut map)
            .unwrap();

        let source = StaticSource(HashMap::from([
            ("EHCPA:PTM_Raster".to_string(), Ok(Some(-9999.900390625))),
            ("EHCPA:SPI_scale_3_Raster".to_string(), Ok(Some(-1.27))),
            (
                "EHCPA:SPI_scale_6_Raster".to_string(),
                Err(ViewerError::Transport("timeout".to_string())),
            ),
        ]));

        let click = map.click_at(map.center());
        let batch = coordinator.prepare(&click, &map.viewport(), &mut registry);
        let outcome = batch.execute(&source).await;
        assert!(coordinator.apply(outcome, &mut registry));

        assert_eq!(registry.result(&LayerKey::new("PTM")), Some(&PointValue::NoData));
        assert_eq!(
            registry.result(&LayerKey::new("SPI_3")),
            Some(&PointValue::Value(-1.27))
        );
        assert!(matches!(
            registry.result(&LayerKey::new("SPI_6")),
            Some(PointValue::Error(msg)) if msg.starts_with("Error al obtener el valor del raster para SPI_6")
        ));
    }

    #[tokio::test]
    async fn test_layer_results_apply_individually() {
        use futures::StreamExt;

        let (mut registry, mut map, mut coordinator) = setup();
        registry
            .set_enabled(&LayerKey::new("SPI_3"), true, &mut map)
            .unwrap();
        let source = StaticSource(HashMap::from([
            ("EHCPA:PTM_Raster".to_string(), Ok(Some(42.0))),
            ("EHCPA:SPI_scale_3_Raster".to_string(), Ok(Some(0.5))),
        ]));

        let click = map.click_at(map.center());
        let batch = coordinator.prepare(&click, &map.viewport(), &mut registry);
        let tag = batch.tag;
        let outcomes: Vec<LayerOutcome> = batch.results(&source).collect().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.tag == tag));

        for outcome in outcomes {
            assert!(coordinator.apply_layer(outcome, &mut registry));
        }
        assert_eq!(
            registry.result(&LayerKey::new("PTM")),
            Some(&PointValue::Value(42.0))
        );

        coordinator.invalidate();
        let stale = LayerOutcome {
            tag,
            key: LayerKey::new("PTM"),
            value: PointValue::Value(1.0),
        };
        assert!(!coordinator.apply_layer(stale, &mut registry));
    }

    #[tokio::test]
    async fn test_invalidate_discards_in_flight_batch() {
        let (mut registry, map, mut coordinator) = setup();
        let source = StaticSource(HashMap::from([(
            "EHCPA:PTM_Raster".to_string(),
            Ok(Some(10.2)),
        )]));

        let click = map.click_at(map.center());
        let batch = coordinator.prepare(&click, &map.viewport(), &mut registry);
        coordinator.invalidate();
        let outcome = batch.execute(&source).await;

        assert!(!coordinator.apply(outcome, &mut registry));
        assert_eq!(registry.result(&LayerKey::new("PTM")), None);
    }
}
