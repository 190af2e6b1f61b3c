// src/app/worker.rs
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::app::events::{CacheEvent, SharedSink};
use crate::app::metadata::MetadataCache;
use crate::app::scanner::DirectoryScanner;
use crate::app::types::{RefetchMsg, ScanMsg, ScannedEntry};

/// A running category scan. Dropping the handle does not stop the thread;
/// call [`ScanHandle::stop`].
pub struct ScanHandle {
    rx: Receiver<ScanMsg>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sink: SharedSink,
    category: String,
}

impl ScanHandle {
    pub fn receiver(&self) -> &Receiver<ScanMsg> {
        &self.rx
    }

    /// Checked between entries and again after each lookup; an in-flight
    /// lookup finishes on its own but its entry is not reported.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Drain whatever has arrived without blocking.
    pub fn poll(&self) -> Vec<ScanMsg> {
        self.rx.try_iter().collect()
    }

    /// Wait for the scan thread. A panic on that thread is reported, not propagated.
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                self.sink.emit(CacheEvent::WorkerPanicked {
                    category: self.category.clone(),
                });
            }
        }
    }
}

pub struct ScanWorker;

impl ScanWorker {
    /// Scan `category_dir` on a background thread. Cached data only, unless
    /// `force_update` is set, in which case uncached entries are fetched one by one.
    pub fn spawn(
        cache: Arc<MetadataCache>,
        sink: SharedSink,
        category_dir: PathBuf,
        force_update: bool,
    ) -> ScanHandle {
        let (tx, rx) = mpsc::channel::<ScanMsg>();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let category = category_dir.display().to_string();
        let worker_sink = sink.clone();
        let thread = thread::spawn(move || {
            run_scan(&cache, &worker_sink, &category_dir, force_update, &flag, &tx);
        });
        ScanHandle {
            rx,
            stop,
            thread: Some(thread),
            sink,
            category,
        }
    }

    /// Forced refetch of one entry as its own short background unit.
    pub fn spawn_refetch(cache: Arc<MetadataCache>, identifier: String) -> Receiver<RefetchMsg> {
        let (tx, rx) = mpsc::channel::<RefetchMsg>();
        thread::spawn(move || {
            let record = cache.get_info(&identifier, true);
            let thumbnail = cache.cached_thumbnail(&identifier);
            let _ = tx.send(RefetchMsg::Done {
                identifier,
                record,
                thumbnail,
            });
        });
        rx
    }
}

fn run_scan(
    cache: &MetadataCache,
    sink: &SharedSink,
    category_dir: &std::path::Path,
    force_update: bool,
    stop: &AtomicBool,
    tx: &Sender<ScanMsg>,
) {
    let category = category_dir.display().to_string();
    let entries = match DirectoryScanner::scan(category_dir) {
        Ok(entries) => entries,
        Err(err) => {
            sink.emit(CacheEvent::ScanFailed {
                category,
                error: err.to_string(),
            });
            let _ = tx.send(ScanMsg::Error(format!(
                "cannot scan {}: {err}",
                category_dir.display()
            )));
            let _ = tx.send(ScanMsg::Done { processed: 0 });
            return;
        }
    };
    sink.emit(CacheEvent::ScanStarted {
        category: category.clone(),
        entries: entries.len(),
    });

    let mut processed = 0usize;
    for entry in entries {
        if stop.load(Ordering::SeqCst) {
            sink.emit(CacheEvent::ScanStopped {
                category,
                processed,
            });
            return;
        }

        let mut record = cache.cached_info(&entry.name);
        if record.is_none() && force_update {
            record = cache.get_info(&entry.name, true);
        }
        if stop.load(Ordering::SeqCst) {
            sink.emit(CacheEvent::ScanStopped {
                category,
                processed,
            });
            return;
        }
        let thumbnail = cache.cached_thumbnail(&entry.name);

        processed += 1;
        if tx
            .send(ScanMsg::Entry(ScannedEntry {
                entry,
                record,
                thumbnail,
            }))
            .is_err()
        {
            // Receiver gone; nobody is listening.
            return;
        }
    }

    if stop.load(Ordering::SeqCst) {
        sink.emit(CacheEvent::ScanStopped { category, processed });
        return;
    }
    sink.emit(CacheEvent::ScanFinished { category, processed });
    let _ = tx.send(ScanMsg::Done { processed });
}
