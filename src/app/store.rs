use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::ImageFormat;

use crate::app::errors::StoreError;
use crate::app::events::{CacheEvent, SharedSink};
use crate::app::types::MetadataRecord;

const METADATA_DIR: &str = "metadata";
const THUMBNAIL_DIR: &str = "thumbnails";
const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "png", "webp", "gif"];

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One JSON file per identifier under `metadata/`, one raw image per
/// identifier under `thumbnails/`.
pub struct MetadataStore {
    root: PathBuf,
    sink: SharedSink,
}

impl MetadataStore {
    pub fn open(root: impl Into<PathBuf>, sink: SharedSink) -> Result<Self, StoreError> {
        let root = root.into();
        for sub in [METADATA_DIR, THUMBNAIL_DIR] {
            let dir = root.join(sub);
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(Self { root, sink })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has(&self, identifier: &str) -> bool {
        let Ok(record) = self.record_path(identifier) else {
            return false;
        };
        record.is_file() && self.thumbnail_path(identifier).is_some()
    }

    /// Cache-friendly read: a corrupt or unreadable file is reported and
    /// comes back as `None`.
    pub fn read(&self, identifier: &str) -> Option<MetadataRecord> {
        match self.read_checked(identifier) {
            Ok(found) => found,
            Err(StoreError::InvalidIdentifier(_)) => None,
            Err(err) => {
                self.sink.emit(CacheEvent::CorruptRecord {
                    identifier: identifier.to_string(),
                    error: err.to_string(),
                });
                None
            }
        }
    }

    pub fn read_checked(&self, identifier: &str) -> Result<Option<MetadataRecord>, StoreError> {
        let path = self.record_path(identifier)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(path, err)),
        };
        let mut record: MetadataRecord = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        // Older files carry no identifier; the key is authoritative.
        record.identifier = identifier.to_string();
        Ok(Some(record))
    }

    pub fn write(&self, identifier: &str, record: &MetadataRecord) -> Result<(), StoreError> {
        let dest = self.record_path(identifier)?;
        let data = serde_json::to_vec_pretty(record).map_err(StoreError::Encode)?;
        write_atomic(&dest, &data)
    }

    /// Store raw bytes as received. The extension follows the sniffed format;
    /// a blob left over under another extension is removed.
    pub fn write_thumbnail(&self, identifier: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        validate_identifier(identifier)?;
        let ext = thumbnail_extension(bytes);
        let dest = self.thumb_dir().join(format!("{identifier}.{ext}"));
        write_atomic(&dest, bytes)?;

        for other in THUMBNAIL_EXTENSIONS.iter().filter(|e| **e != ext) {
            let stale = self.thumb_dir().join(format!("{identifier}.{other}"));
            if let Err(err) = fs::remove_file(&stale) {
                if err.kind() != ErrorKind::NotFound {
                    return Err(StoreError::io(stale, err));
                }
            }
        }
        Ok(dest)
    }

    /// Drop every blob for `identifier`. Returns whether anything was removed.
    pub fn remove_thumbnail(&self, identifier: &str) -> Result<bool, StoreError> {
        validate_identifier(identifier)?;
        let mut removed = false;
        for ext in THUMBNAIL_EXTENSIONS {
            let path = self.thumb_dir().join(format!("{identifier}.{ext}"));
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(StoreError::io(path, err)),
            }
        }
        Ok(removed)
    }

    pub fn thumbnail_path(&self, identifier: &str) -> Option<PathBuf> {
        validate_identifier(identifier).ok()?;
        THUMBNAIL_EXTENSIONS
            .iter()
            .map(|ext| self.thumb_dir().join(format!("{identifier}.{ext}")))
            .find(|p| fs::metadata(p).map_or(false, |m| m.is_file() && m.len() > 0))
    }

    /// Identifiers with a record file, sorted.
    pub fn identifiers(&self) -> io::Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(self.meta_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                out.push(stem.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Remove `*.part` leftovers from interrupted writes and zero-length thumbnails.
    pub fn sweep_partials(&self) -> io::Result<usize> {
        let mut removed = 0usize;
        for dir in [self.meta_dir(), self.thumb_dir()] {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let path = entry.path();
                let is_part = path.extension().and_then(|e| e.to_str()) == Some("part");
                let is_empty_thumb = dir == self.thumb_dir() && entry.metadata()?.len() == 0;
                if is_part || is_empty_thumb {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn meta_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    fn thumb_dir(&self) -> PathBuf {
        self.root.join(THUMBNAIL_DIR)
    }

    fn record_path(&self, identifier: &str) -> Result<PathBuf, StoreError> {
        validate_identifier(identifier)?;
        Ok(self.meta_dir().join(format!("{identifier}.json")))
    }
}

fn validate_identifier(identifier: &str) -> Result<(), StoreError> {
    let bad = identifier.trim().is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier.contains(['/', '\\', '\0']);
    if bad {
        Err(StoreError::InvalidIdentifier(identifier.to_string()))
    } else {
        Ok(())
    }
}

fn thumbnail_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Gif) => "gif",
        _ => "jpg",
    }
}

/// Write next to `dest` under a unique `.part` name, then rename over it.
fn write_atomic(dest: &Path, data: &[u8]) -> Result<(), StoreError> {
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let tmp = dest.with_file_name(format!("{file_name}.{}-{seq}.part", std::process::id()));
    {
        let mut f = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(data).map_err(|e| StoreError::io(&tmp, e))?;
        f.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
    }
    if let Err(err) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(dest, err));
    }
    Ok(())
}
