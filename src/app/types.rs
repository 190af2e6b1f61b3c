// src/app/types.rs
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---- persisted record ----
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub identifier: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "year_compat")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub cover_url: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub plot: String,
    #[serde(default, deserialize_with = "rating_compat")]
    pub rating: f64,
    #[serde(deserialize_with = "cached_at_compat")]
    pub cached_at: DateTime<Utc>,
}

impl MetadataRecord {
    /// Build a fresh record from a lookup, stamped with the current time.
    pub fn from_lookup(identifier: &str, found: &LookupResult) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: found.title.clone(),
            year: found.year.clone(),
            cover_url: found.cover_url.clone(),
            plot: found.plot.clone(),
            rating: found.rating,
            cached_at: Utc::now(),
        }
    }

    /// "Title (YYYY)" when the year is known.
    pub fn display_title(&self) -> String {
        match self.year.as_deref() {
            Some(y) if !y.is_empty() => format!("{} ({})", self.title, y),
            _ => self.title.clone(),
        }
    }
}

// ---- transient lookup output ----
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LookupResult {
    pub title: String,
    pub year: Option<String>,
    pub cover_url: String,
    pub plot: String,
    pub rating: f64,
    pub thumbnail: Option<Vec<u8>>,
}

// ---- scanner output ----
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: PathBuf,
    pub category: String,
    pub media_file: Option<PathBuf>,
}

// ---- cross-thread messages ----
#[derive(Clone, Debug)]
pub struct ScannedEntry {
    pub entry: DirectoryEntry,
    pub record: Option<MetadataRecord>,
    pub thumbnail: Option<PathBuf>,
}

impl ScannedEntry {
    /// Entries always render with at least the folder name.
    pub fn label(&self) -> String {
        self.record
            .as_ref()
            .map(MetadataRecord::display_title)
            .unwrap_or_else(|| self.entry.name.clone())
    }
}

#[derive(Debug)]
pub enum ScanMsg {
    Entry(ScannedEntry),
    Error(String),
    Done { processed: usize },
}

#[derive(Debug)]
pub enum RefetchMsg {
    Done {
        identifier: String,
        record: Option<MetadataRecord>,
        thumbnail: Option<PathBuf>,
    },
}

// ---- serde compat for record files written by older versions ----
fn string_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearRepr {
    Text(String),
    Number(i64),
}

fn year_compat<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<YearRepr>::deserialize(d)? {
        Some(YearRepr::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(YearRepr::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RatingRepr {
    Number(f64),
    Text(String),
}

fn rating_compat<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Option::<RatingRepr>::deserialize(d)? {
        Some(RatingRepr::Number(n)) => n,
        Some(RatingRepr::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}

fn cached_at_compat<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp `{raw}`")))
}

/// RFC 3339, or the naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` form (taken as UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
