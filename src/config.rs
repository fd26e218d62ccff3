//! Config file for logwindow
//!
//! Optional TOML file supplying defaults that command-line flags override.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming the config file when `--config` is absent
pub const CONFIG_ENV: &str = "LOGWINDOW_CONFIG";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Events shown by `head` and `tail` without `-n`
    pub lines: usize,

    /// Poll interval for `-f`, in seconds
    pub interval_secs: u64,

    /// Cap on events per backend page
    pub page_size: Option<usize>,

    /// Prefix events with their timestamp
    pub timestamps: bool,

    /// Replay fixture used when `--fixture` is absent
    pub fixture: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lines: 10,
            interval_secs: 10,
            page_size: None,
            timestamps: false,
            fixture: None,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config file")
    }

    /// Load the config from `path`, falling back to `$LOGWINDOW_CONFIG`,
    /// then to the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => PathBuf::from(path),
                None => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }
}
