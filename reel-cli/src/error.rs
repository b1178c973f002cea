use std::path::PathBuf;

use reel_api::ApiError;
use reel_engine::{ConfigError, DeviceIdError, PlaybackError};
use reel_engine::actor::SendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("device id error: {0}")]
    Device(#[from] DeviceIdError),

    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("feed session error: {0}")]
    Session(#[from] SendError),

    #[error("the feed is empty")]
    EmptyFeed,

    #[error("logging setup failed: {0}")]
    Logging(String),
}
