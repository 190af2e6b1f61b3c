// src/app/events.rs
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

/// Structured events emitted by the cache, store, lookup client and scan worker.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheEvent {
    CacheHit { identifier: String },
    CacheMiss { identifier: String, forced: bool },
    CorruptRecord { identifier: String, error: String },
    EmptyQuery { identifier: String },
    LookupStarted { identifier: String, query: String },
    NotFound { query: String },
    LookupFailed { query: String, error: String },
    ThumbnailFailed { url: String, error: String },
    RecordWritten { identifier: String },
    ThumbnailWritten { identifier: String, bytes: usize },
    ThumbnailRemoved { identifier: String },
    StoreWriteFailed { identifier: String, error: String },
    ScanStarted { category: String, entries: usize },
    ScanStopped { category: String, processed: usize },
    ScanFinished { category: String, processed: usize },
    ScanFailed { category: String, error: String },
    WorkerPanicked { category: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: CacheEvent);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Forwards events to `tracing`, tagged with the owning component.
#[derive(Clone, Debug)]
pub struct TracingSink {
    component: &'static str,
}

impl TracingSink {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn shared(component: &'static str) -> SharedSink {
        Arc::new(Self::new(component))
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: CacheEvent) {
        let component = self.component;
        match event {
            CacheEvent::CacheHit { identifier } => {
                debug!(component, %identifier, "using cached data");
            }
            CacheEvent::CacheMiss { identifier, forced } => {
                debug!(component, %identifier, forced, "cache miss");
            }
            CacheEvent::CorruptRecord { identifier, error } => {
                warn!(component, %identifier, %error, "cached record unreadable; treating as miss");
            }
            CacheEvent::EmptyQuery { identifier } => {
                debug!(component, %identifier, "name normalizes to nothing; skipping lookup");
            }
            CacheEvent::LookupStarted { identifier, query } => {
                info!(component, %identifier, %query, "searching remote source");
            }
            CacheEvent::NotFound { query } => {
                warn!(component, %query, "no movies found");
            }
            CacheEvent::LookupFailed { query, error } => {
                warn!(component, %query, %error, "lookup failed");
            }
            CacheEvent::ThumbnailFailed { url, error } => {
                warn!(component, %url, %error, "thumbnail download failed");
            }
            CacheEvent::RecordWritten { identifier } => {
                info!(component, %identifier, "cached new data");
            }
            CacheEvent::ThumbnailWritten { identifier, bytes } => {
                info!(component, %identifier, bytes, "stored thumbnail");
            }
            CacheEvent::ThumbnailRemoved { identifier } => {
                info!(component, %identifier, "dropped stale thumbnail");
            }
            CacheEvent::StoreWriteFailed { identifier, error } => {
                warn!(component, %identifier, %error, "cache write failed");
            }
            CacheEvent::ScanStarted { category, entries } => {
                info!(component, %category, entries, "scan started");
            }
            CacheEvent::ScanStopped { category, processed } => {
                info!(component, %category, processed, "scan stopped");
            }
            CacheEvent::ScanFinished { category, processed } => {
                info!(component, %category, processed, "scan finished");
            }
            CacheEvent::ScanFailed { category, error } => {
                warn!(component, %category, %error, "scan failed");
            }
            CacheEvent::WorkerPanicked { category } => {
                error!(component, %category, "scan thread panicked");
            }
        }
    }
}

/// Keeps every event in memory. Handy for tests and for UIs that show a log pane.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CacheEvent>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, pred: impl Fn(&CacheEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: CacheEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
