//! In-process mock of the services the viewer talks to.
//!
//! One axum server on `127.0.0.1:0` answers for GeoServer's WMS endpoint,
//! Nominatim's `/search` and the EHCPA backend's `/download` and
//! `/get_dates`. Tests configure canned answers per layer / per query and
//! inspect the recorded requests afterwards.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::fixtures::{empty_feature_info_json, feature_info_json};

/// Canned GetFeatureInfo answer for one server layer.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFeature {
    /// One feature with this `GRAY_INDEX`
    Value(f64),
    /// One feature with `GRAY_INDEX: null`
    Null,
    /// A FeatureCollection without features
    Empty,
    /// Non-success HTTP status with a plain-text body
    Status(u16),
    /// 200 with a body that is not JSON
    Malformed,
}

/// Canned answer for `/download/:layers`.
#[derive(Debug, Clone, PartialEq)]
pub enum MockDownload {
    /// Archive bytes sent with a Content-Length header
    Archive(Vec<u8>),
    /// Archive bytes streamed without a Content-Length header
    Chunked(Vec<u8>),
    /// Error status with a `{"message": ...}` body
    Error { status: u16, message: String },
    /// Announces `declared` bytes, sends `data` and drops the connection
    Truncated { declared: usize, data: Vec<u8> },
    /// Archive sent in `chunk`-sized pieces, one every `interval`
    Throttled {
        data: Vec<u8>,
        chunk: usize,
        interval: Duration,
    },
}

impl Default for MockDownload {
    fn default() -> Self {
        MockDownload::Archive(b"PK\x05\x06".to_vec())
    }
}

/// One request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct MockState {
    features: HashMap<String, MockFeature>,
    feature_delays: HashMap<String, Duration>,
    places: HashMap<String, Vec<Value>>,
    search_status: Option<u16>,
    download: MockDownload,
    dates: Option<Value>,
    requests: Vec<RecordedRequest>,
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Running mock server. Aborted on drop.
pub struct MockServices {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl MockServices {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(MockState {
            dates: Some(crate::fixtures::dates_json()),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/geoserver/EHCPA/wms", get(wms_handler))
            .route("/search", get(search_handler))
            .route("/download/:layers", get(download_handler))
            .route("/get_dates", get(dates_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock listener address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server failed");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn wms_url(&self) -> String {
        format!("{}/geoserver/EHCPA/wms", self.base_url())
    }

    pub fn download_url(&self) -> String {
        format!("{}/download", self.base_url())
    }

    pub fn dates_url(&self) -> String {
        format!("{}/get_dates", self.base_url())
    }

    /// Answer GetFeatureInfo for `server_layer` with `feature`.
    pub fn set_feature(&self, server_layer: &str, feature: MockFeature) {
        lock(&self.state)
            .features
            .insert(server_layer.to_string(), feature);
    }

    /// Hold GetFeatureInfo answers for `server_layer` back by `delay`.
    pub fn set_feature_delay(&self, server_layer: &str, delay: Duration) {
        lock(&self.state)
            .feature_delays
            .insert(server_layer.to_string(), delay);
    }

    /// Answer `/search?q=<query>` with these Nominatim places.
    pub fn set_places(&self, query: &str, places: Vec<Value>) {
        lock(&self.state).places.insert(query.to_string(), places);
    }

    /// Make every `/search` call fail with `status`.
    pub fn fail_search(&self, status: u16) {
        lock(&self.state).search_status = Some(status);
    }

    pub fn set_download(&self, download: MockDownload) {
        lock(&self.state).download = download;
    }

    /// Replace the dates body; `None` makes the endpoint answer 500.
    pub fn set_dates(&self, dates: Option<Value>) {
        lock(&self.state).dates = dates;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Recorded requests whose path starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl Drop for MockServices {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A `http://127.0.0.1:<port>` URL nothing is listening on.
pub async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("probe listener address");
    drop(listener);
    format!("http://{}", addr)
}

fn record(state: &SharedState, path: String, query: &HashMap<String, String>) {
    lock(state).requests.push(RecordedRequest {
        path,
        query: query.clone(),
    });
}

async fn wms_handler(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "/geoserver/EHCPA/wms".to_string(), &params);

    let layer = params.get("query_layers").cloned().unwrap_or_default();
    let (feature, delay) = {
        let guard = lock(&state);
        (
            guard.features.get(&layer).cloned().unwrap_or(MockFeature::Empty),
            guard.feature_delays.get(&layer).copied(),
        )
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    match feature {
        MockFeature::Value(v) => Json(feature_info_json(Some(v))).into_response(),
        MockFeature::Null => Json(feature_info_json(None)).into_response(),
        MockFeature::Empty => Json(empty_feature_info_json()).into_response(),
        MockFeature::Status(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "layer unavailable",
        )
            .into_response(),
        MockFeature::Malformed => (
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>ServiceException</body></html>",
        )
            .into_response(),
    }
}

async fn search_handler(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "/search".to_string(), &params);

    let guard = lock(&state);
    if let Some(code) = guard.search_status {
        return StatusCode::from_u16(code)
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            .into_response();
    }

    let query = params.get("q").cloned().unwrap_or_default();
    let places = guard.places.get(&query).cloned().unwrap_or_default();
    Json(Value::Array(places)).into_response()
}

async fn download_handler(
    State(state): State<SharedState>,
    Path(layers): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record(&state, format!("/download/{}", layers), &params);

    let download = lock(&state).download.clone();
    match download {
        MockDownload::Archive(data) => (
            [(header::CONTENT_TYPE, "application/zip")],
            Bytes::from(data),
        )
            .into_response(),
        MockDownload::Chunked(data) => {
            let chunks: Vec<Result<Bytes, std::io::Error>> = data
                .chunks(1024)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            let body = Body::from_stream(futures::stream::iter(chunks));
            ([(header::CONTENT_TYPE, "application/zip")], body).into_response()
        }
        MockDownload::Truncated { declared, data } => {
            let parts: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(Bytes::from(data)),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "backend went away",
                )),
            ];
            let body = Body::from_stream(futures::stream::iter(parts));
            (
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_LENGTH, declared.to_string()),
                ],
                body,
            )
                .into_response()
        }
        MockDownload::Throttled {
            data,
            chunk,
            interval,
        } => {
            let total = data.len();
            let chunks: Vec<Bytes> = data
                .chunks(chunk.max(1))
                .map(Bytes::copy_from_slice)
                .collect();
            let stream = futures::stream::iter(chunks).then(move |c| async move {
                tokio::time::sleep(interval).await;
                Ok::<_, std::io::Error>(c)
            });
            (
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_LENGTH, total.to_string()),
                ],
                Body::from_stream(stream),
            )
                .into_response()
        }
        MockDownload::Error { status, message } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "message": message })),
        )
            .into_response(),
    }
}

async fn dates_handler(State(state): State<SharedState>) -> Response {
    record(&state, "/get_dates".to_string(), &HashMap::new());

    match lock(&state).dates.clone() {
        Some(dates) => Json(dates).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
