use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use crate::app::normalize::is_video_extension;
use crate::app::types::DirectoryEntry;

/// Only a movie folder's own files count; `extras/` and similar are not searched.
const MEDIA_SEARCH_DEPTH: usize = 1;

pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Category names under `base`, sorted case-insensitively.
    pub fn list_categories(base: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(base)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        Ok(names)
    }

    /// One entry per movie folder, in filesystem enumeration order.
    pub fn scan(category_path: &Path) -> io::Result<Vec<DirectoryEntry>> {
        let category = category_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut out = Vec::new();
        for entry in fs::read_dir(category_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            out.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                media_file: Self::find_media_file(&path),
                path,
                category: category.clone(),
            });
        }
        Ok(out)
    }

    /// First video file by name, if any. Unreadable subtrees are skipped.
    pub fn find_media_file(movie_dir: &Path) -> Option<std::path::PathBuf> {
        WalkDir::new(movie_dir)
            .min_depth(1)
            .max_depth(MEDIA_SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .find(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(is_video_extension)
            })
            .map(|e| e.into_path())
    }
}
