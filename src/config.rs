// src/config.rs

//! Configuration for the wall display.
//!
//! The configuration is a JSON document. Every section and field is
//! optional; anything missing falls back to the defaults below, which
//! describe the 3×2 wall on 192.168.3.4–9.
//!
//! The file is found through the first command-line argument or, failing
//! that, the `INSTA_WALL_CONFIG` environment variable. Without either the
//! defaults are used.

use crate::animation::{LevelConfig, ShowConfig};
use crate::error::{WallError, WallResult};
use crate::input::InputConfig;
use crate::preview::PreviewConfig;
use crate::scheduler::{normalize_fps, Pacing, DEFAULT_FPS};
use crate::screen::PanelLayout;
use crate::upload::UploadConfig;
use anyhow::anyhow;
use log::info;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "INSTA_WALL_CONFIG";

/// Process-wide configuration, loaded once on first access. Holds the load
/// error if the file named on the command line cannot be used.
pub static CONFIG: Lazy<WallResult<Config>> = Lazy::new(|| load_from(config_path().as_deref()));

/// The process configuration, or why it could not be loaded.
pub fn config() -> anyhow::Result<&'static Config> {
    CONFIG.as_ref().map_err(|e| {
        let path = config_path().unwrap_or_default();
        anyhow!("Failed to load configuration from {}: {}", path.display(), e)
    })
}

/// Loads `path`, or the defaults when no file was given.
pub fn load_from(path: Option<&Path>) -> WallResult<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// Where the configuration file is, if one was given.
pub fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wall: WallConfig,
    pub delivery: DeliveryConfig,
    pub input: InputConfig,
    pub show: ShowConfig,
    pub preview: PreviewConfig,
    pub upload: UploadConfig,
    pub levels: LevelConfig,
}

impl Config {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> WallResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> WallResult<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| WallError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WallResult<()> {
        let layout = self.wall.layout();
        if layout.panel_count() == 0 {
            return Err(WallError::Config("the wall has no panels".to_string()));
        }
        if self.wall.addresses.len() != layout.panel_count() {
            return Err(WallError::Config(format!(
                "expected {} panel addresses, got {}",
                layout.panel_count(),
                self.wall.addresses.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    pub panels_x: usize,
    pub panels_y: usize,
    /// Panel IPv4 addresses in row-major order, top-left first.
    pub addresses: Vec<String>,
}

impl WallConfig {
    pub fn layout(&self) -> PanelLayout {
        PanelLayout::new(self.panels_x, self.panels_y)
    }
}

impl Default for WallConfig {
    fn default() -> Self {
        WallConfig {
            panels_x: 3,
            panels_y: 2,
            addresses: [
                "192.168.3.6",
                "192.168.3.9",
                "192.168.3.8",
                "192.168.3.5",
                "192.168.3.7",
                "192.168.3.4",
            ]
            .iter()
            .map(|a| a.to_string())
            .collect(),
        }
    }
}

/// Frame delivery settings. Levels are in `[0, 1]`; unset levels keep the
/// panels' built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub fps: i64,
    pub pacing: Pacing,
    pub backoff_ms: u64,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub afterglow: Option<f64>,
}

impl DeliveryConfig {
    /// The frame rate actually used: out-of-range values become 50.
    pub fn fps(&self) -> u32 {
        normalize_fps(self.fps)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            fps: DEFAULT_FPS as i64,
            pacing: Pacing::FixedRate,
            backoff_ms: 1000,
            brightness: None,
            contrast: None,
            afterglow: None,
        }
    }
}
