use std::path::PathBuf;

/// Result alias for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors produced while driving media playback for a feed position.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    #[error("media load failed: {reason}")]
    Load { reason: String },

    #[error("play rejected: {reason}")]
    PlayRejected { reason: String, retryable: bool },

    #[error("position {index} is no longer current")]
    Superseded { index: usize },

    #[error("no media element for position {index}")]
    MissingElement { index: usize },

    #[error("engagement request failed: {reason}")]
    Engagement { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl PlaybackError {
    pub fn load(reason: impl Into<String>) -> Self {
        Self::Load {
            reason: reason.into(),
        }
    }

    /// A rejection caused by autoplay policy or decoder contention.
    pub fn transient_rejection(reason: impl Into<String>) -> Self {
        Self::PlayRejected {
            reason: reason.into(),
            retryable: true,
        }
    }

    /// A rejection that will not go away on its own (unsupported source, aborted element).
    pub fn permanent_rejection(reason: impl Into<String>) -> Self {
        Self::PlayRejected {
            reason: reason.into(),
            retryable: false,
        }
    }

    pub fn engagement(reason: impl Into<String>) -> Self {
        Self::Engagement {
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PlayRejected { retryable, .. } => *retryable,
            Self::Engagement { .. } => true,
            Self::Load { .. }
            | Self::Superseded { .. }
            | Self::MissingElement { .. }
            | Self::Internal { .. } => false,
        }
    }
}

/// Errors raised while loading or validating engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Errors raised by the persistent device identifier store.
#[derive(Debug, thiserror::Error)]
pub enum DeviceIdError {
    #[error("device id store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device id store {path} holds an invalid id: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}
