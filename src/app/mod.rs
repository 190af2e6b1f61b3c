// src/app/mod.rs
pub mod errors;
pub mod events;
pub mod metadata;
pub mod normalize;
pub mod remote;
pub mod scanner;
pub mod store;
pub mod types;
pub mod worker;

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub use errors::{FetchError, LookupError, StoreError};
pub use events::{CacheEvent, EventSink, MemorySink, SharedSink, TracingSink};
pub use metadata::MetadataCache;
pub use normalize::normalize;
pub use remote::{MetadataSource, OmdbClient, ReqwestTransport, Transport};
pub use scanner::DirectoryScanner;
pub use store::MetadataStore;
pub use types::{DirectoryEntry, LookupResult, MetadataRecord, RefetchMsg, ScanMsg, ScannedEntry};
pub use worker::{ScanHandle, ScanWorker};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cache: {0}")]
    Store(#[from] StoreError),
    #[error("http client: {0}")]
    Http(#[from] FetchError),
}

/// What a presentation layer holds: metadata access, thumbnails, scans.
pub struct MovieDirectory {
    cache: Arc<MetadataCache>,
    sink: SharedSink,
}

impl MovieDirectory {
    /// Wire the OMDb client and on-disk store from config, logging through `tracing`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, SetupError> {
        let store = MetadataStore::open(cfg.cache_dir(), TracingSink::shared("store"))?;
        let client = OmdbClient::from_config(cfg, TracingSink::shared("omdb"))?;
        Ok(Self::with_parts(
            store,
            Box::new(client),
            TracingSink::shared("cache"),
        ))
    }

    pub fn with_parts(store: MetadataStore, source: Box<dyn MetadataSource>, sink: SharedSink) -> Self {
        let cache = Arc::new(MetadataCache::new(store, source, sink.clone()));
        Self { cache, sink }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn get_info(&self, identifier: &str, force_refresh: bool) -> Option<MetadataRecord> {
        self.cache.get_info(identifier, force_refresh)
    }

    pub fn cached_thumbnail(&self, identifier: &str) -> Option<PathBuf> {
        self.cache.cached_thumbnail(identifier)
    }

    pub fn categories(&self, base: &Path) -> std::io::Result<Vec<String>> {
        DirectoryScanner::list_categories(base)
    }

    pub fn start_scan(&self, category_dir: impl Into<PathBuf>, force_update: bool) -> ScanHandle {
        ScanWorker::spawn(
            self.cache.clone(),
            self.sink.clone(),
            category_dir.into(),
            force_update,
        )
    }

    pub fn refetch(&self, identifier: impl Into<String>) -> Receiver<RefetchMsg> {
        ScanWorker::spawn_refetch(self.cache.clone(), identifier.into())
    }
}
