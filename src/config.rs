use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const CONFIG_ENV: &str = "MOVIEDIR_CONFIG";
pub const API_KEY_ENV: &str = "MOVIEDIR_OMDB_API_KEY";

pub const DEFAULT_CACHE_DIR: &str = ".moviedir_cache";
pub const DEFAULT_OMDB_BASE_URL: &str = "https://www.omdbapi.com/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str = concat!("moviedir/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cache_dir: Option<String>,
    pub omdb_api_key: Option<String>,
    pub omdb_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub base_directory: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            omdb_api_key: None,
            omdb_base_url: DEFAULT_OMDB_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_directory: None,
        }
    }
}

impl AppConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    cache_dir: Option<String>,
    omdb_api_key: Option<String>,
    omdb_base_url: Option<String>,
    #[serde(alias = "timeout_secs")]
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    base_directory: Option<String>,
}

/// Load `config.json` (or the file named by `MOVIEDIR_CONFIG`), falling back
/// to defaults for anything missing or unreadable.
pub fn load_config() -> AppConfig {
    let cfg_path = env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut cfg = load_config_from(&cfg_path);

    if let Ok(key) = env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            cfg.omdb_api_key = Some(key.trim().to_string());
        }
    }

    cfg
}

pub fn load_config_from(cfg_path: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();

    match fs::read_to_string(cfg_path) {
        Ok(raw) => match serde_json::from_str::<RawConfig>(&raw) {
            Ok(parsed) => {
                if parsed.cache_dir.is_some() {
                    cfg.cache_dir = parsed.cache_dir;
                }
                if let Some(key) = parsed.omdb_api_key.filter(|k| !k.trim().is_empty()) {
                    cfg.omdb_api_key = Some(key.trim().to_string());
                }
                if let Some(url) = parsed.omdb_base_url.filter(|u| !u.trim().is_empty()) {
                    cfg.omdb_base_url = url.trim().to_string();
                }
                if let Some(secs) = parsed.request_timeout_secs {
                    if secs == 0 {
                        warn!(
                            "request_timeout_secs = 0 in {} is not allowed; using {}s.",
                            cfg_path.display(),
                            DEFAULT_TIMEOUT_SECS
                        );
                    } else {
                        cfg.request_timeout_secs = secs;
                    }
                }
                if let Some(agent) = parsed.user_agent.filter(|a| !a.trim().is_empty()) {
                    cfg.user_agent = agent;
                }
                if parsed.base_directory.is_some() {
                    cfg.base_directory = parsed.base_directory;
                }
                info!("Loaded config from {}", cfg_path.display());
            }
            Err(err) => {
                warn!(
                    "Failed to parse {} ({}). Using defaults.",
                    cfg_path.display(),
                    err
                );
            }
        },
        Err(_) => {
            info!("No {} found; using defaults", cfg_path.display());
        }
    }

    cfg
}
