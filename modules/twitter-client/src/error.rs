use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TwitterError>;

#[derive(Debug, Error)]
pub enum TwitterError {
    /// The provider's request window is exhausted. Recovered inside the
    /// client by sleeping until the window resets; callers never see this.
    #[error("Rate limited until {reset_at:?}")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Private, suspended, or deleted remote entity. Permanently
    /// unavailable; batch callers skip and continue.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Deleted post or actor. Same soft-skip treatment as Unauthorized.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl TwitterError {
    /// True for errors that mean "no further data available for this node"
    /// rather than a failure of the whole unit of work.
    pub fn is_soft_skip(&self) -> bool {
        matches!(self, TwitterError::Unauthorized(_) | TwitterError::NotFound(_))
    }
}

impl From<reqwest::Error> for TwitterError {
    fn from(err: reqwest::Error) -> Self {
        TwitterError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TwitterError {
    fn from(err: serde_json::Error) -> Self {
        TwitterError::Parse(err.to_string())
    }
}
