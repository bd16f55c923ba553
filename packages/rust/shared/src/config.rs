//! Application configuration for skywatch.
//!
//! User config lives at `~/.skywatch/skywatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkywatchError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "skywatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".skywatch";

// ---------------------------------------------------------------------------
// Config structs (matching skywatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Feed source settings.
    #[serde(default)]
    pub feed: FeedSection,

    /// Output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Extraction pattern extensions.
    #[serde(default)]
    pub extract: ExtractConfig,
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSection {
    /// Feed URL (Atom or RSS).
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Keep at most this many newest entries per poll.
    #[serde(default = "default_feed_limit")]
    pub limit: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            limit: default_feed_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_feed_url() -> String {
    // RSS-Bridge mirror of the announcement channel, Atom format.
    "https://wtf.roflcopter.fr/rss-bridge/?action=display\
     &bridge=Telegram&username=korenyako&format=Atom&n=100"
        .into()
}
fn default_feed_limit() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for the database and `status.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory the rendered site is written to.
    #[serde(default = "default_site_dir")]
    pub site_dir: String,

    /// Optional directory of user templates overriding the built-ins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            site_dir: default_site_dir(),
            templates_dir: None,
        }
    }
}

fn default_data_dir() -> String {
    "./data".into()
}
fn default_site_dir() -> String {
    "./public".into()
}

/// `[extract]` section — user extensions merged over the built-in patterns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Extra "restrictions lifted" patterns, tried after the built-ins.
    #[serde(default)]
    pub open_patterns: Vec<String>,

    /// Extra "restrictions introduced" patterns, tried after the built-ins.
    #[serde(default)]
    pub closed_patterns: Vec<String>,

    /// Extra airport registry entries: display name → ICAO code.
    #[serde(default)]
    pub airports: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Feed config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime feed configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Feed URL to poll.
    pub url: String,
    /// Keep at most this many newest entries.
    pub limit: usize,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&AppConfig> for FeedConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            url: config.feed.url.clone(),
            limit: config.feed.limit,
            timeout_secs: config.feed.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.skywatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SkywatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.skywatch/skywatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SkywatchError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SkywatchError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SkywatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SkywatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SkywatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
