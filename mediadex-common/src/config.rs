//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every key is optional;
//! a missing file logs a warning and falls back to built-in defaults so the
//! resolver still starts. A file that exists but cannot be parsed, or that
//! asks for a source without the credentials it needs, is a startup error.
//!
//! # Priority order
//!
//! Config file: `--config` argument, then `MEDIADEX_CONFIG`, then
//! `<config dir>/mediadex/config.toml`.
//!
//! Root folder: `--root-folder` argument, then `MEDIADEX_ROOT_FOLDER`, then
//! the `root_folder` TOML key, then the OS data directory.

use crate::{Error, Result, Source};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MEDIADEX_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "MEDIADEX_CONFIG";

const DATABASE_FILE_NAME: &str = "mediadex.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Folder holding the cache database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Cache database path; relative paths are taken from the root folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub primer: PrimerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Payload cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Age at which a cached payload is treated as a miss and deleted
    #[serde(default = "default_payload_ttl_secs")]
    pub payload_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            payload_ttl_secs: default_payload_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn payload_ttl(&self) -> Duration {
        Duration::from_secs(self.payload_ttl_secs)
    }
}

/// How the resolver walks the sources of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// One source after another; later sources see names found by earlier ones
    #[default]
    Sequential,
    /// All sources at once, joined before write-back
    Concurrent,
}

/// Catalog source settings
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Per-call timeout for every adapter call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub resolve_mode: ResolveMode,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Explicit list of sources to register. When omitted, every source
    /// whose credentials are present is registered.
    #[serde(default)]
    pub enabled: Option<Vec<Source>>,

    /// MyAnimeList API client id (sent as X-MAL-CLIENT-ID)
    #[serde(default)]
    pub mal_client_id: Option<String>,

    /// Local AniDB title dump (`aid|type|language|title` lines)
    #[serde(default)]
    pub anidb_titles_path: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            resolve_mode: ResolveMode::default(),
            user_agent: default_user_agent(),
            enabled: None,
            mal_client_id: None,
            anidb_titles_path: None,
        }
    }
}

impl SourcesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether the source was named in an explicit `enabled` list
    pub fn explicitly_enabled(&self, source: Source) -> bool {
        self.enabled
            .as_ref()
            .map(|list| list.contains(&source))
            .unwrap_or(false)
    }

    /// Whether the source should be registered at all
    pub fn is_enabled(&self, source: Source) -> bool {
        match &self.enabled {
            Some(list) => list.contains(&source),
            None => true,
        }
    }

    /// Credential or data file the source cannot run without, if missing
    pub fn missing_requirement(&self, source: Source) -> Option<&'static str> {
        match source {
            Source::MyAnimeList if blank(self.mal_client_id.as_deref()) => {
                Some("sources.mal_client_id")
            }
            Source::AniDb if self.anidb_titles_path.is_none() => Some("sources.anidb_titles_path"),
            _ => None,
        }
    }
}

/// Bulk primer settings
#[derive(Debug, Clone, Deserialize)]
pub struct PrimerConfig {
    /// Source popular entries are cross-resolved against
    #[serde(default = "default_primer_secondary")]
    pub secondary: Option<Source>,
}

impl Default for PrimerConfig {
    fn default() -> Self {
        Self {
            secondary: default_primer_secondary(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_payload_ttl_secs() -> u64 {
    86_400
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

fn default_user_agent() -> String {
    format!("mediadex/{}", env!("CARGO_PKG_VERSION"))
}

fn default_primer_secondary() -> Option<Source> {
    Some(Source::MyAnimeList)
}

fn blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Locate the config file by priority and load it.
    ///
    /// A missing file is not an error: a warning is logged and defaults are used.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        let Some(path) = locate_config_file(cli_path) else {
            warn!("No config file found, using built-in defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading config from {}", path.display());
        Self::load(&path)
    }

    /// Reject settings the resolver cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.sources.request_timeout_ms == 0 {
            return Err(Error::Config(
                "sources.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.cache.payload_ttl_secs == 0 {
            return Err(Error::Config(
                "cache.payload_ttl_secs must be greater than zero".to_string(),
            ));
        }

        for source in Source::ALL {
            if !self.sources.explicitly_enabled(source) {
                continue;
            }
            if let Some(key) = self.sources.missing_requirement(source) {
                return Err(Error::Config(format!(
                    "Source '{}' is enabled but {} is not set",
                    source, key
                )));
            }
        }

        Ok(())
    }

    /// Database file location under the resolved root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join(DATABASE_FILE_NAME),
        }
    }
}

fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("mediadex").join("config.toml"))
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mediadex"))
        .unwrap_or_else(|| PathBuf::from("./mediadex_data"))
}
