// src/app/remote.rs
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::app::errors::{FetchError, LookupError};
use crate::app::events::{CacheEvent, SharedSink};
use crate::app::types::LookupResult;
use crate::config::AppConfig;

/// One blocking GET returning the body bytes.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Search-then-detail lookup against some movie database.
pub trait MetadataSource: Send + Sync {
    /// `Ok(None)` means the search came back empty.
    fn lookup(&self, query: &str) -> Result<Option<LookupResult>, LookupError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let resp = self.client.get(url).send().map_err(classify)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.bytes().map_err(classify)?.to_vec())
    }
}

// ---- OMDb wire shapes ----
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
    response: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "imdbID")]
    imdb_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetailResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    poster: Option<String>,
    #[serde(default)]
    plot: Option<String>,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: Option<String>,
    response: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct OmdbClient {
    transport: Arc<dyn Transport>,
    api_key: Option<String>,
    base_url: String,
    sink: SharedSink,
}

impl OmdbClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_key: Option<String>,
        base_url: impl Into<String>,
        sink: SharedSink,
    ) -> Self {
        Self {
            transport,
            api_key,
            base_url: base_url.into(),
            sink,
        }
    }

    pub fn from_config(cfg: &AppConfig, sink: SharedSink) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(cfg.request_timeout(), &cfg.user_agent)?;
        Ok(Self::new(
            Arc::new(transport),
            cfg.omdb_api_key.clone(),
            cfg.omdb_base_url.clone(),
            sink,
        ))
    }

    fn endpoint(&self, api_key: &str, params: &str) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{sep}apikey={}&{params}",
            self.base_url,
            urlencoding::encode(api_key)
        )
    }

    fn search(&self, api_key: &str, query: &str) -> Result<Option<String>, LookupError> {
        let url = self.endpoint(
            api_key,
            &format!("s={}&type=movie", urlencoding::encode(query)),
        );
        let body = self.transport.get(&url)?;
        let parsed: SearchResponse = serde_json::from_slice(&body)
            .map_err(|source| LookupError::Parse { what: "search", source })?;

        if !is_true(&parsed.response) {
            return match parsed.error {
                Some(msg) if is_not_found(&msg) => Ok(None),
                Some(msg) => Err(LookupError::Remote(msg)),
                None => Ok(None),
            };
        }
        // Source order is the ranking; first hit wins.
        Ok(parsed.search.into_iter().next().map(|hit| hit.imdb_id))
    }

    fn detail(&self, api_key: &str, imdb_id: &str) -> Result<DetailResponse, LookupError> {
        let url = self.endpoint(
            api_key,
            &format!("i={}&plot=full", urlencoding::encode(imdb_id)),
        );
        let body = self.transport.get(&url)?;
        let parsed: DetailResponse = serde_json::from_slice(&body)
            .map_err(|source| LookupError::Parse { what: "detail", source })?;
        if !is_true(&parsed.response) {
            let msg = parsed.error.unwrap_or_else(|| "detail lookup refused".into());
            return Err(LookupError::Remote(msg));
        }
        Ok(parsed)
    }

    fn download_thumbnail(&self, url: &str) -> Option<Vec<u8>> {
        let result = self.transport.get(url).map_err(|e| e.to_string()).and_then(|bytes| {
            if image::guess_format(&bytes).is_ok() {
                Ok(bytes)
            } else {
                Err(format!("{} bytes not recognized as an image", bytes.len()))
            }
        });
        match result {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                self.sink.emit(CacheEvent::ThumbnailFailed {
                    url: url.to_string(),
                    error,
                });
                None
            }
        }
    }
}

impl MetadataSource for OmdbClient {
    fn lookup(&self, query: &str) -> Result<Option<LookupResult>, LookupError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LookupError::MissingApiKey)?;

        let Some(imdb_id) = self.search(api_key, query)? else {
            return Ok(None);
        };
        let detail = self.detail(api_key, &imdb_id)?;

        let cover_url = present(detail.poster).unwrap_or_default();
        let thumbnail = if cover_url.is_empty() {
            None
        } else {
            self.download_thumbnail(&cover_url)
        };

        Ok(Some(LookupResult {
            title: present(detail.title).unwrap_or_else(|| query.to_string()),
            year: present(detail.year),
            cover_url,
            plot: present(detail.plot)
                .map(|p| first_paragraph(&p))
                .unwrap_or_default(),
            rating: present(detail.imdb_rating)
                .and_then(|r| r.parse::<f64>().ok())
                .unwrap_or(0.0),
            thumbnail,
        }))
    }
}

fn is_true(flag: &str) -> bool {
    flag.eq_ignore_ascii_case("true")
}

fn is_not_found(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains("not found")
}

/// OMDb uses "N/A" for missing fields.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A")
}

fn first_paragraph(plot: &str) -> String {
    plot.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or_default()
        .to_string()
}
