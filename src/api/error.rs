use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{endpoint}: request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint}: HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("{endpoint}: malformed response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Worth another attempt: network trouble, server errors, throttling and
    /// half-written bodies. Client errors and bad URLs are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { .. } | ApiError::Decode { .. } => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            ApiError::Url(_) => false,
        }
    }
}
