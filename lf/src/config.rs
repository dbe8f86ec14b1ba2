//! LeadFlow configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::scheduler::SchedulerConfig;

/// Main LeadFlow configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Where the document lives
    pub storage: StorageConfig,

    /// Task pickup and concurrency
    pub scheduler: SchedulerConfig,

    /// External browser driver
    pub automation: AutomationConfig,
}

/// Names a config file explicitly, like `--config`
pub const CONFIG_ENV: &str = "LEADFLOW_CONFIG";

const FILE_NAME: &str = ".leadflow.yml";

impl Config {
    /// Load the first config that applies, or defaults when there is none
    ///
    /// An explicit file (`--config`, then `LEADFLOW_CONFIG`) must exist. A
    /// discovered file (`./.leadflow.yml`, then
    /// `<config_dir>/leadflow/leadflow.yml`) is only used when present, but
    /// one that is present and broken is an error rather than skipped. A
    /// relative `storage.path` is taken relative to the file it came from.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        match locate(config_path) {
            Some(path) => {
                Self::load_from_file(&path).with_context(|| format!("Failed to load config from {}", path.display()))
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Read only `log-level`, quietly, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = locate(config_path)?;
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str::<Self>(&content).ok()?.log_level
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let mut config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        if config.storage.path.is_relative()
            && let Some(dir) = path.parent()
        {
            config.storage.path = dir.join(&config.storage.path);
        }

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}

/// The config file to read, if any
fn locate(config_path: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(path.clone());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover(&cwd, dirs::config_dir().as_deref())
}

/// First existing file among the implicit locations
fn discover(cwd: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    let local = cwd.join(FILE_NAME);
    let user = config_dir.map(|dir| dir.join("leadflow").join("leadflow.yml"));
    std::iter::once(local).chain(user).find(|path| path.is_file())
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON document
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("leadflow")
                .join("state.json"),
        }
    }
}

/// External automation command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Program to run per scrape; `lf run` refuses to start without one
    pub command: Option<String>,

    /// Arguments passed before the request is written to stdin
    pub args: Vec<String>,

    /// Kill the command after this long
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_ms: 600_000,
        }
    }
}

impl AutomationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
