//! Configuration loading and resolution for freshet
//!
//! Resolution priority per key: environment variable → TOML config file →
//! compiled default. The config file path itself comes from the CLI
//! argument, the `FRESHET_CONFIG` environment variable, or the platform
//! config directory, in that order.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default days-back window for the artist-album date filter.
pub const DEFAULT_DAYS_BACK: u32 = 90;

/// Default cache window in hours. Values below this are clamped up at use
/// time to protect the upstream service.
pub const DEFAULT_CACHE_HOURS: u32 = 24;

const DEFAULT_PORT: u16 = 5770;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Upstream catalog endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the catalog API, without a trailing slash.
    pub base_url: String,
    /// Token endpoint used by the credential manager.
    pub token_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_url: String::new(),
        }
    }
}

/// Credential material for the catalog session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub refresh_token: String,
}

/// What to poll and how aggressively to cache it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Monitored artist ids, free text. Commas, semicolons and whitespace
    /// all act as delimiters.
    pub artist_ids: String,
    /// Only artist albums released within this many days are kept.
    pub days_back: u32,
    /// Cache window in hours (floored at 24 when evaluated).
    pub cache_hours: u32,
    /// Poll the curated home feed even when artist ids are configured.
    pub prefer_home_feed: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            artist_ids: String::new(),
            days_back: DEFAULT_DAYS_BACK,
            cache_hours: DEFAULT_CACHE_HOURS,
            prefer_home_feed: false,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Complete freshet configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FreshetConfig {
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    pub watch: WatchConfig,
    pub server: ServerConfig,
}

impl FreshetConfig {
    /// Load configuration from the given path (or the resolved default),
    /// then apply environment overrides.
    ///
    /// A missing config file is not an error: defaults apply and the
    /// environment can still supply every key.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_config_path(cli_path);

        let mut config = match &path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p).map_err(|e| ConfigError::Read {
                    path: p.clone(),
                    source: e,
                })?;
                let parsed: FreshetConfig =
                    toml::from_str(&content).map_err(|e| ConfigError::Parse {
                        path: p.clone(),
                        source: e,
                    })?;
                info!("Configuration loaded from {}", p.display());
                parsed
            }
            Some(p) => {
                info!(
                    "No config file at {}; using defaults and environment",
                    p.display()
                );
                FreshetConfig::default()
            }
            None => {
                info!("No config file path resolved; using defaults and environment");
                FreshetConfig::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `FRESHET_*` environment overrides on top of file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FRESHET_BASE_URL") {
            info!("upstream.base_url overridden from environment");
            self.upstream.base_url = v;
        }
        if let Ok(v) = std::env::var("FRESHET_TOKEN_URL") {
            self.upstream.token_url = v;
        }
        if let Ok(v) = std::env::var("FRESHET_CLIENT_ID") {
            self.auth.client_id = v;
        }
        if let Ok(v) = std::env::var("FRESHET_REFRESH_TOKEN") {
            self.auth.refresh_token = v;
        }
        if let Ok(v) = std::env::var("FRESHET_ARTIST_IDS") {
            info!("watch.artist_ids overridden from environment");
            self.watch.artist_ids = v;
        }
        if let Ok(v) = std::env::var("FRESHET_DAYS_BACK") {
            match v.parse() {
                Ok(n) => self.watch.days_back = n,
                Err(_) => warn!("Ignoring non-numeric FRESHET_DAYS_BACK: {}", v),
            }
        }
        if let Ok(v) = std::env::var("FRESHET_CACHE_HOURS") {
            match v.parse() {
                Ok(n) => self.watch.cache_hours = n,
                Err(_) => warn!("Ignoring non-numeric FRESHET_CACHE_HOURS: {}", v),
            }
        }
        if let Ok(v) = std::env::var("FRESHET_PREFER_HOME_FEED") {
            match v.parse() {
                Ok(b) => self.watch.prefer_home_feed = b,
                Err(_) => warn!("Ignoring non-boolean FRESHET_PREFER_HOME_FEED: {}", v),
            }
        }
    }

    /// Parsed monitored-artist ids: delimiter-tolerant, trimmed,
    /// deduplicated, in first-seen order.
    pub fn artist_ids(&self) -> Vec<String> {
        parse_artist_ids(&self.watch.artist_ids)
    }
}

/// Resolve the config file path: CLI argument, `FRESHET_CONFIG`
/// environment variable, then the platform config directory.
fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = cli_path {
        return Some(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("FRESHET_CONFIG") {
        return Some(PathBuf::from(p));
    }
    dirs::config_dir().map(|d| d.join("freshet").join("freshet.toml"))
}

/// Split a free-text artist-id list on commas, semicolons and whitespace.
fn parse_artist_ids(raw: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for piece in raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        let id = piece.trim();
        if id.is_empty() {
            continue;
        }
        if !seen.iter().any(|s: &String| s == id) {
            seen.push(id.to_string());
        }
    }
    seen
}
