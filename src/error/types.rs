//! Upload error types

use std::time::Duration;
use thiserror::Error;

/// Marker the Bot API puts in the description of a 429 response
const RATE_LIMIT_MARKER: &str = "too many requests";

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No working {pool} left in the pool")]
    PoolExhausted { pool: &'static str },

    #[error("Delivery failed: {reason}")]
    Delivery { reason: String },

    #[error("Rate limited: {reason}")]
    RateLimited {
        reason: String,
        /// Wait requested by the server, if it sent one
        retry_after: Option<Duration>,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl UploadError {
    /// Build a delivery failure from a server-reported reason
    ///
    /// Reasons carrying the rate-limit marker (or a 429 error code) become
    /// `RateLimited` so the retry wrapper can cool down before the next attempt.
    /// `retry_after` is the server's `parameters.retry_after`, in seconds.
    pub fn from_api_failure(
        reason: impl Into<String>,
        error_code: Option<i64>,
        retry_after: Option<u64>,
    ) -> Self {
        let reason = reason.into();
        if error_code == Some(429) || reason.to_lowercase().contains(RATE_LIMIT_MARKER) {
            UploadError::RateLimited {
                reason,
                retry_after: retry_after.map(Duration::from_secs),
            }
        } else {
            UploadError::Delivery { reason }
        }
    }

    /// Pool exhaustion and source failures end the pipeline immediately
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UploadError::PoolExhausted { .. } | UploadError::Source(_) | UploadError::Config(_)
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UploadError::RateLimited { .. })
    }

    /// Server-requested wait of a rate-limited failure
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            UploadError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, UploadError::PoolExhausted { .. })
    }
}

/// Errors raised while listing or reading a media source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to walk directory {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}
