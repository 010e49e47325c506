//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `BVI_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: a warning is logged
//! and compiled defaults are used.

use crate::dates::DateFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "BVI_ROOT_FOLDER";
/// Environment variable overriding the similarity threshold
pub const SIMILARITY_THRESHOLD_ENV: &str = "BVI_SIMILARITY_THRESHOLD";
/// Environment variable overriding the similarity scorer
pub const SCORER_ENV: &str = "BVI_SCORER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "bvi.db";

/// Compiled-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub const LOG_LEVEL: &'static str = "info";
    pub const SIMILARITY_THRESHOLD: f64 = 0.92;
    pub const MIN_FUZZY_LENGTH: usize = 5;
    pub const READER_BIND_ADDRESS: &'static str = "127.0.0.1:5740";

    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
        }
    }
}

/// Similarity algorithm used for fuzzy company matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    JaroWinkler,
    NormalizedLevenshtein,
    #[default]
    TokenSort,
}

impl FromStr for ScorerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jaro_winkler" => Ok(ScorerKind::JaroWinkler),
            "normalized_levenshtein" => Ok(ScorerKind::NormalizedLevenshtein),
            "token_sort" => Ok(ScorerKind::TokenSort),
            other => Err(Error::Config(format!("Unknown scorer: {}", other))),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
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

/// `[matching]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub scorer: ScorerKind,
    /// Normalized names shorter than this never fuzzy-match
    #[serde(default = "default_min_fuzzy_length")]
    pub min_fuzzy_length: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            scorer: ScorerKind::default(),
            min_fuzzy_length: default_min_fuzzy_length(),
        }
    }
}

impl MatchingConfig {
    /// Apply `BVI_SIMILARITY_THRESHOLD` / `BVI_SCORER` overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(SIMILARITY_THRESHOLD_ENV) {
            self.similarity_threshold = raw.trim().parse().map_err(|e| {
                Error::Config(format!("{} is not a number ({}): {}", SIMILARITY_THRESHOLD_ENV, raw, e))
            })?;
            info!(threshold = self.similarity_threshold, "Similarity threshold from environment");
        }
        if let Ok(raw) = std::env::var(SCORER_ENV) {
            self.scorer = raw.parse()?;
            info!(scorer = ?self.scorer, "Similarity scorer from environment");
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// `[ingest]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub date_format: DateFormat,
}

/// `[reader]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Contents of `bvi.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
}

impl TomlConfig {
    /// Parse a config file, failing on unreadable or invalid TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.matching.validate()?;
        Ok(config)
    }

    /// Load the explicit path, or the platform config file, or defaults.
    ///
    /// Never fails. Runs before logging is set up (the log level lives in
    /// the file), so the outcome is returned for the caller to log.
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, ConfigSource) {
        let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return (Self::default(), ConfigSource::NotFound),
        };

        match Self::load(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Rejected {
                    path,
                    reason: e.to_string(),
                },
            ),
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No explicit path and no platform config file
    NotFound,
    /// File present but unreadable or invalid; defaults were used
    Rejected { path: PathBuf, reason: String },
}

impl ConfigSource {
    /// Log the outcome; call once the subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config: {}", path.display()),
            ConfigSource::NotFound => warn!("No config file found - using compiled defaults"),
            ConfigSource::Rejected { path, reason } => warn!(
                path = %path.display(),
                "{} - using compiled defaults",
                reason
            ),
        }
    }
}

/// Resolve the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from config file: {}", path.display());
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Platform config file location, if one exists
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("bvi").join("bvi.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/bvi/bvi.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/bvi (or /var/lib/bvi for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("bvi"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/bvi"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("bvi"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/bvi"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("bvi"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\bvi"))
    } else {
        PathBuf::from("./bvi_data")
    }
}

fn default_log_level() -> String {
    CompiledDefaults::LOG_LEVEL.to_string()
}

fn default_similarity_threshold() -> f64 {
    CompiledDefaults::SIMILARITY_THRESHOLD
}

fn default_min_fuzzy_length() -> usize {
    CompiledDefaults::MIN_FUZZY_LENGTH
}

fn default_bind_address() -> String {
    CompiledDefaults::READER_BIND_ADDRESS.to_string()
}
