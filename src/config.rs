//! Configuration loading and management

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::bus::{BUS_NAME, OBJECT_PATH};
use crate::hotkey::Shortcut;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "VOXPUT_INDICATOR_CONFIG";

/// Controller configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub notifications: NotificationConfig,
    pub shortcut: ShortcutConfig,
}

/// Where to find voxputd and whether to wake it on startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bus_name: String,
    pub object_path: String,
    /// Ask the bus to activate the daemon when the controller starts
    pub auto_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bus_name: BUS_NAME.to_string(),
            object_path: OBJECT_PATH.to_string(),
            auto_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Show a desktop notification with the transcript when one completes
    pub show_transcript: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            show_transcript: true,
        }
    }
}

/// How the shortcut drives the daemon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutMode {
    /// Record while the shortcut is held
    #[default]
    Hold,
    /// Each press toggles recording
    Toggle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    /// GTK-style accelerator, e.g. `<Super><Alt>r`
    pub accelerator: String,
    pub mode: ShortcutMode,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            accelerator: "<Super><Alt>r".to_string(),
            mode: ShortcutMode::Hold,
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config TOML {}", path.display()))?;
        config.validate()?;

        info!(?path, "config file loaded");
        Ok(config)
    }

    /// Parsed shortcut binding
    pub fn shortcut(&self) -> Result<Shortcut> {
        self.shortcut
            .accelerator
            .parse()
            .with_context(|| format!("invalid shortcut accelerator {:?}", self.shortcut.accelerator))
    }

    fn validate(&self) -> Result<()> {
        if self.daemon.bus_name.is_empty() {
            bail!("daemon.bus_name must not be empty");
        }
        if !self.daemon.object_path.starts_with('/') {
            bail!(
                "daemon.object_path must be an absolute object path, got {:?}",
                self.daemon.object_path
            );
        }
        self.shortcut()?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("HOME environment variable not set")?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(config_dir.join("voxput").join("indicator.toml"))
    }
}
