// src/app/metadata.rs
use std::path::PathBuf;

use crate::app::events::{CacheEvent, SharedSink};
use crate::app::normalize::normalize;
use crate::app::remote::MetadataSource;
use crate::app::store::MetadataStore;
use crate::app::types::MetadataRecord;

/// Cache-first metadata access. The only writer of the store.
pub struct MetadataCache {
    store: MetadataStore,
    source: Box<dyn MetadataSource>,
    sink: SharedSink,
}

impl MetadataCache {
    pub fn new(store: MetadataStore, source: Box<dyn MetadataSource>, sink: SharedSink) -> Self {
        Self {
            store,
            source,
            sink,
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Cached record, or a fresh lookup when forced or not fully cached.
    /// Failures never escape; they come back as `None` and leave the store as it was.
    pub fn get_info(&self, identifier: &str, force_refresh: bool) -> Option<MetadataRecord> {
        if !force_refresh && self.store.has(identifier) {
            if let Some(record) = self.store.read(identifier) {
                self.sink.emit(CacheEvent::CacheHit {
                    identifier: identifier.to_string(),
                });
                return Some(record);
            }
        }
        self.sink.emit(CacheEvent::CacheMiss {
            identifier: identifier.to_string(),
            forced: force_refresh,
        });
        self.fetch_and_store(identifier)
    }

    /// Cache-only read used by bulk scans; never touches the network.
    pub fn cached_info(&self, identifier: &str) -> Option<MetadataRecord> {
        let record = self.store.read(identifier)?;
        self.sink.emit(CacheEvent::CacheHit {
            identifier: identifier.to_string(),
        });
        Some(record)
    }

    pub fn cached_thumbnail(&self, identifier: &str) -> Option<PathBuf> {
        self.store.thumbnail_path(identifier)
    }

    fn fetch_and_store(&self, identifier: &str) -> Option<MetadataRecord> {
        let query = normalize(identifier);
        if query.is_empty() {
            self.sink.emit(CacheEvent::EmptyQuery {
                identifier: identifier.to_string(),
            });
            return None;
        }
        self.sink.emit(CacheEvent::LookupStarted {
            identifier: identifier.to_string(),
            query: query.clone(),
        });

        let found = match self.source.lookup(&query) {
            Ok(Some(found)) => found,
            Ok(None) => {
                self.sink.emit(CacheEvent::NotFound { query });
                return None;
            }
            Err(err) => {
                self.sink.emit(CacheEvent::LookupFailed {
                    query,
                    error: err.to_string(),
                });
                return None;
            }
        };

        let record = MetadataRecord::from_lookup(identifier, &found);
        let previous_cover = self
            .store
            .read_checked(identifier)
            .ok()
            .flatten()
            .map(|old| old.cover_url);
        if let Err(err) = self.store.write(identifier, &record) {
            // Shown this time, cached on a later refresh.
            self.sink.emit(CacheEvent::StoreWriteFailed {
                identifier: identifier.to_string(),
                error: err.to_string(),
            });
            return Some(record);
        }
        self.sink.emit(CacheEvent::RecordWritten {
            identifier: identifier.to_string(),
        });

        match found.thumbnail.as_deref() {
            Some(bytes) if !record.cover_url.is_empty() => {
                match self.store.write_thumbnail(identifier, bytes) {
                    Ok(_) => self.sink.emit(CacheEvent::ThumbnailWritten {
                        identifier: identifier.to_string(),
                        bytes: bytes.len(),
                    }),
                    Err(err) => self.sink.emit(CacheEvent::StoreWriteFailed {
                        identifier: identifier.to_string(),
                        error: err.to_string(),
                    }),
                }
            }
            // A poster that no longer matches the record must not be served.
            _ if record.cover_url.is_empty()
                || previous_cover.as_deref() != Some(record.cover_url.as_str()) =>
            {
                self.drop_thumbnail(identifier);
            }
            _ => {}
        }

        Some(record)
    }

    fn drop_thumbnail(&self, identifier: &str) {
        match self.store.remove_thumbnail(identifier) {
            Ok(true) => self.sink.emit(CacheEvent::ThumbnailRemoved {
                identifier: identifier.to_string(),
            }),
            Ok(false) => {}
            Err(err) => self.sink.emit(CacheEvent::StoreWriteFailed {
                identifier: identifier.to_string(),
                error: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::app::events::MemorySink;
    use crate::app::remote::testing::{inception_transport, ScriptedSource, JPEG};
    use crate::app::remote::OmdbClient;
    use crate::app::types::LookupResult;

    struct Shared(Arc<ScriptedSource>);

    impl MetadataSource for Shared {
        fn lookup(
            &self,
            query: &str,
        ) -> Result<Option<LookupResult>, crate::app::errors::LookupError> {
            self.0.lookup(query)
        }
    }

    fn found(title: &str, cover: &str) -> LookupResult {
        LookupResult {
            title: title.into(),
            year: Some("1995".into()),
            cover_url: cover.into(),
            plot: "Plot.".into(),
            rating: 8.3,
            thumbnail: (!cover.is_empty()).then(|| JPEG.to_vec()),
        }
    }

    fn setup() -> (
        tempfile::TempDir,
        MetadataCache,
        Arc<ScriptedSource>,
        Arc<MemorySink>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let source = Arc::new(ScriptedSource::default());
        let store = MetadataStore::open(dir.path(), sink.clone()).unwrap();
        let cache = MetadataCache::new(store, Box::new(Shared(source.clone())), sink.clone());
        (dir, cache, source, sink)
    }

    #[test]
    fn cached_reads_are_idempotent() {
        let (_dir, cache, source, _) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        cache.get_info("Heat.1995.mkv", true).unwrap();

        let a = cache.get_info("Heat.1995.mkv", false).unwrap();
        let b = cache.get_info("Heat.1995.mkv", false).unwrap();
        assert_eq!(a, b);
        assert_eq!(source.call_count(), 1);
    }

    #[test]
    fn forced_refresh_then_cached_read_agree() {
        let (_dir, cache, source, _) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        let fresh = cache.get_info("Heat", true).unwrap();
        let cached = cache.get_info("Heat", false).unwrap();
        assert_eq!(fresh, cached);
        assert_eq!(cached.identifier, "Heat");
    }

    #[test]
    fn failed_refresh_keeps_previous_record() {
        let (_dir, cache, source, sink) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        let before = cache.get_info("Heat", true).unwrap();

        source.answer("Heat", Err("HTTP 503".into()));
        assert!(cache.get_info("Heat", true).is_none());
        assert_eq!(cache.store().read("Heat"), Some(before));
        assert_eq!(
            sink.count(|e| matches!(e, CacheEvent::LookupFailed { .. })),
            1
        );
    }

    #[test]
    fn forced_refresh_replaces_record() {
        let (_dir, cache, source, _) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        cache.get_info("Heat", true).unwrap();
        let mut newer = found("Heat (Director's Cut)", "http://img/heat.jpg");
        newer.year = None;
        source.answer("Heat", Ok(Some(newer)));
        let got = cache.get_info("Heat", true).unwrap();
        assert_eq!(cache.store().read("Heat").unwrap().year, None);
        assert_eq!(got.title, "Heat (Director's Cut)");
    }

    #[test]
    fn not_found_writes_nothing() {
        let (dir, cache, source, _) = setup();
        assert!(cache.get_info("Unknown.Film.2003", true).is_none());
        assert_eq!(source.call_count(), 1);
        assert_eq!(fs::read_dir(dir.path().join("metadata")).unwrap().count(), 0);
        assert_eq!(fs::read_dir(dir.path().join("thumbnails")).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_record_behaves_as_miss() {
        let (dir, cache, source, sink) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        cache.get_info("Heat", true).unwrap();
        fs::write(dir.path().join("metadata").join("Heat.json"), "{{{").unwrap();

        let got = cache.get_info("Heat", false).unwrap();
        assert_eq!(got.title, "Heat");
        assert_eq!(source.call_count(), 2);
        assert!(sink.count(|e| matches!(e, CacheEvent::CorruptRecord { .. })) >= 1);
        assert!(cache.store().read("Heat").is_some());
    }

    #[test]
    fn record_without_cover_is_not_a_full_hit() {
        let (_dir, cache, source, _) = setup();
        source.answer("Heat", Ok(Some(found("Heat", ""))));
        cache.get_info("Heat", true).unwrap();
        assert!(cache.cached_thumbnail("Heat").is_none());
        assert!(cache.cached_info("Heat").is_some());

        cache.get_info("Heat", false).unwrap();
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn degenerate_identifier_skips_lookup() {
        let (_dir, cache, source, sink) = setup();
        assert!(cache.get_info("(1999)", true).is_none());
        assert_eq!(source.call_count(), 0);
        assert_eq!(sink.count(|e| matches!(e, CacheEvent::EmptyQuery { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, CacheEvent::NotFound { .. })), 0);
        assert_eq!(sink.count(|e| matches!(e, CacheEvent::LookupStarted { .. })), 0);
    }

    #[test]
    fn refresh_without_cover_drops_old_poster() {
        let (_dir, cache, source, sink) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        cache.get_info("Heat", true).unwrap();
        assert!(cache.cached_thumbnail("Heat").is_some());

        source.answer("Heat", Ok(Some(found("Heat", ""))));
        let got = cache.get_info("Heat", true).unwrap();
        assert!(got.cover_url.is_empty());
        assert!(cache.cached_thumbnail("Heat").is_none());
        assert!(!cache.store().has("Heat"));
        assert_eq!(
            sink.count(|e| matches!(e, CacheEvent::ThumbnailRemoved { .. })),
            1
        );
    }

    #[test]
    fn changed_cover_without_bytes_drops_old_poster() {
        let (_dir, cache, source, _) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        cache.get_info("Heat", true).unwrap();

        let mut moved = found("Heat", "http://img/heat-v2.jpg");
        moved.thumbnail = None;
        source.answer("Heat", Ok(Some(moved)));
        cache.get_info("Heat", true).unwrap();
        assert!(cache.cached_thumbnail("Heat").is_none());
    }

    #[test]
    fn same_cover_without_bytes_keeps_poster() {
        let (_dir, cache, source, _) = setup();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));
        cache.get_info("Heat", true).unwrap();

        let mut flaky = found("Heat", "http://img/heat.jpg");
        flaky.thumbnail = None;
        source.answer("Heat", Ok(Some(flaky)));
        cache.get_info("Heat", true).unwrap();
        assert!(cache.cached_thumbnail("Heat").is_some());
    }

    #[test]
    fn record_write_failure_still_returns_record() {
        let (dir, cache, source, sink) = setup();
        let meta = dir.path().join("metadata");
        fs::remove_dir_all(&meta).unwrap();
        fs::write(&meta, b"").unwrap();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));

        let got = cache.get_info("Heat", true).unwrap();
        assert_eq!(got.title, "Heat");
        assert_eq!(
            sink.count(|e| matches!(e, CacheEvent::StoreWriteFailed { .. })),
            1
        );
        assert_eq!(sink.count(|e| matches!(e, CacheEvent::RecordWritten { .. })), 0);
        assert_eq!(
            sink.count(|e| matches!(e, CacheEvent::ThumbnailWritten { .. })),
            0
        );
        assert_eq!(fs::read_dir(dir.path().join("thumbnails")).unwrap().count(), 0);
        assert!(cache.cached_info("Heat").is_none());
    }

    #[test]
    fn thumbnail_write_failure_keeps_record() {
        let (dir, cache, source, sink) = setup();
        let thumbs = dir.path().join("thumbnails");
        fs::remove_dir_all(&thumbs).unwrap();
        fs::write(&thumbs, b"").unwrap();
        source.answer("Heat", Ok(Some(found("Heat", "http://img/heat.jpg"))));

        let got = cache.get_info("Heat", true).unwrap();
        assert_eq!(cache.store().read("Heat"), Some(got));
        assert_eq!(
            sink.count(|e| matches!(e, CacheEvent::StoreWriteFailed { .. })),
            1
        );
        assert!(cache.cached_thumbnail("Heat").is_none());
        assert!(thumbs.is_file());
    }

    #[test]
    fn inception_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let store = MetadataStore::open(dir.path(), sink.clone()).unwrap();
        let client = OmdbClient::new(
            Arc::new(inception_transport()),
            Some("key".into()),
            "http://omdb.test/",
            sink.clone(),
        );
        let cache = MetadataCache::new(store, Box::new(client), sink);

        let got = cache.get_info("Inception.2010.mkv", true).unwrap();
        assert_eq!(got.title, "Inception");
        assert_eq!(got.year.as_deref(), Some("2010"));
        assert_eq!(got.rating, 8.8);
        assert_eq!(got.cover_url, "http://x/img.jpg");

        let thumb = cache.cached_thumbnail("Inception.2010.mkv").unwrap();
        assert_eq!(fs::read(thumb).unwrap(), JPEG);
        assert_eq!(cache.get_info("Inception.2010.mkv", false), Some(got));
    }
}
