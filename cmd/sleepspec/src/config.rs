//! Configuration management for the sleepspec CLI.
//!
//! Configuration is stored in ~/.sleepspec/config.yaml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sleepspec::SegmenterConfig;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".sleepspec";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the JSON model bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PathBuf>,

    /// Sample rate of raw PCM input in Hz.
    pub sample_rate: u32,

    /// Segment window length in seconds.
    pub segment_seconds: u32,

    /// Directory of cached feature records, used when `predict` gets no inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_dir: Option<PathBuf>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let seg = SegmenterConfig::default();
        Self {
            model: None,
            sample_rate: seg.sample_rate,
            segment_seconds: seg.segment_seconds,
            record_dir: None,
            config_path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Whether the config file exists on disk.
    pub fn exists(&self) -> bool {
        self.config_path.is_file()
    }

    pub fn segmenter(&self) -> SegmenterConfig {
        SegmenterConfig {
            sample_rate: self.sample_rate,
            segment_seconds: self.segment_seconds,
        }
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.sample_rate == 0 {
            anyhow::bail!("sample_rate must be positive");
        }
        if self.segment_seconds == 0 {
            anyhow::bail!("segment_seconds must be positive");
        }
        Ok(())
    }
}

/// Resolves the config path, falling back to the default location.
pub fn config_path(custom_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Config::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Loads configuration. A missing file yields the defaults.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = config_path(custom_path)?;

    let mut cfg: Config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("{}: {e}", config_path.display()))?
        }
    } else {
        Config::default()
    };
    cfg.validate()?;
    cfg.config_path = config_path;

    Ok(cfg)
}
