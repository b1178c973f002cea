use std::path::{Path, PathBuf};

use reel_api::ApiConfig;
use reel_engine::EngineConfig;
use reel_engine::device::DEVICE_ID_FILE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};

const APP_DIR: &str = "reel";
const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`.
///
/// ```toml
/// [api]
/// base_url = "http://localhost:3000"
///
/// [engine.playback]
/// retain_distance = 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; an
    /// explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let config: AppConfig =
            toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
                path: path.clone(),
                source,
            })?;
        config.engine.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

pub fn default_device_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR).join(DEVICE_ID_FILE))
}
