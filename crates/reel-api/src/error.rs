use reel_engine::PlaybackError;
use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}: {message}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
        message: String,
    },

    #[error("unexpected response during {operation}: {reason}")]
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },
}

impl ApiError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
            message: message.into(),
        }
    }

    pub fn invalid_response(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidResponse { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Network { source } => !source.is_decode() && !source.is_builder(),
        }
    }
}

impl From<ApiError> for PlaybackError {
    fn from(err: ApiError) -> Self {
        PlaybackError::engagement(err.to_string())
    }
}
