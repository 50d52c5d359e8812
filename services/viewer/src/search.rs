//! Debounced location search.
//!
//! Every keystroke restarts a delay; only when it elapses is the geocoder
//! called. Each request carries the generation of the text that started it
//! and replies from older generations are dropped, so a slow answer for
//! "Cor" can never overwrite the results for "Cordoba". Clearing the text
//! takes effect immediately.

use std::sync::Arc;
use std::time::Duration;

use ehcpa_common::LatLng;
use geocoding::{zoom_for_place, GeocodeError, Geocoder, SearchResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const NOT_FOUND_MESSAGE: &str = "No se encontraron resultados en la busqueda.";
pub const ERROR_MESSAGE: &str = "Falla en el servidor de OSM.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// No text, or a selection was made
    Idle,
    /// Waiting for the debounce delay or the geocoder
    Pending,
    Results,
    NotFound,
    Error,
}

/// A chosen result with the zoom the map should fly to.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSelection {
    pub result: SearchResult,
    pub zoom: Option<u8>,
}

impl SearchSelection {
    pub fn position(&self) -> LatLng {
        self.result.position()
    }
}

struct SearchReply {
    generation: u64,
    outcome: Result<Vec<SearchResult>, GeocodeError>,
}

pub struct LocationSearch {
    geocoder: Arc<dyn Geocoder>,
    debounce: Duration,
    text: String,
    results: Vec<SearchResult>,
    status: SearchStatus,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<SearchReply>,
    rx: mpsc::UnboundedReceiver<SearchReply>,
}

impl LocationSearch {
    pub fn new(geocoder: Arc<dyn Geocoder>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            geocoder,
            debounce,
            text: String::new(),
            results: Vec::new(),
            status: SearchStatus::Idle,
            generation: 0,
            pending: None,
            tx,
            rx,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    /// User-facing message for the not-found and error states.
    pub fn message(&self) -> Option<&'static str> {
        match self.status {
            SearchStatus::NotFound => Some(NOT_FOUND_MESSAGE),
            SearchStatus::Error => Some(ERROR_MESSAGE),
            _ => None,
        }
    }

    /// Input changed. Must be called from within a tokio runtime.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cancel_pending();

        if self.text.trim().is_empty() {
            self.results.clear();
            self.status = SearchStatus::Idle;
            return;
        }

        self.status = SearchStatus::Pending;
        let generation = self.generation;
        let query = self.text.clone();
        let geocoder = Arc::clone(&self.geocoder);
        let delay = self.debounce;
        let tx = self.tx.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(generation, query = %query, "Debounce elapsed, searching");
            let outcome = geocoder.search(&query).await;
            // Fails only once the search itself is gone.
            let _ = tx.send(SearchReply {
                generation,
                outcome,
            });
        }));
    }

    /// The clear ("X") action.
    pub fn clear(&mut self) {
        self.set_text("");
    }

    /// Apply replies that already arrived. Returns whether state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(reply) = self.rx.try_recv() {
            changed |= self.apply(reply);
        }
        changed
    }

    /// Wait until the pending search settles. Returns `None` when nothing
    /// is pending.
    pub async fn settled(&mut self) -> Option<SearchStatus> {
        self.pending.as_ref()?;
        while self.pending.is_some() {
            let reply = self.rx.recv().await?;
            self.apply(reply);
        }
        Some(self.status)
    }

    /// Choose a result; the list is closed and the text shows its label.
    pub fn select(&mut self, index: usize) -> Option<SearchSelection> {
        let result = self.results.get(index)?.clone();
        self.cancel_pending();
        self.text = result.label.clone();
        self.results.clear();
        self.status = SearchStatus::Idle;

        let zoom = zoom_for_place(result.place_rank, &result.address_type, &result.name);
        debug!(label = %result.label, rank = result.place_rank, ?zoom, "Search result selected");
        Some(SearchSelection { result, zoom })
    }

    fn cancel_pending(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    fn apply(&mut self, reply: SearchReply) -> bool {
        if reply.generation != self.generation {
            debug!(
                generation = reply.generation,
                current = self.generation,
                "Discarding superseded search reply"
            );
            return false;
        }
        self.pending = None;

        match reply.outcome {
            Ok(results) if results.is_empty() => {
                self.results.clear();
                self.status = SearchStatus::NotFound;
            }
            Ok(results) => {
                self.results = results;
                self.status = SearchStatus::Results;
            }
            Err(e) => {
                warn!(error = %e, "Location search failed");
                self.results.clear();
                self.status = SearchStatus::Error;
            }
        }
        true
    }
}

impl Drop for LocationSearch {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
