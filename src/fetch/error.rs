use std::path::PathBuf;
use std::time::SystemTimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        reason: Option<String>,
    },

    #[error("Failed to read response body from {0}")]
    ResponseBody(String, #[source] reqwest::Error),

    #[error("Failed to parse JSON response from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response has no hourly block")]
    MissingHourly,

    #[error("Hourly block has an empty time axis")]
    EmptyHourly,

    #[error("Time axis is not evenly spaced: step {position} is {found}s, expected {expected}s")]
    IrregularTimeAxis {
        position: usize,
        expected: i64,
        found: i64,
    },

    #[error("Time-series interval must be positive, got {0}s")]
    InvalidInterval(i64),

    // Cache failures are logged by the client and never abort a fetch.
    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to calculate system time difference for {0:?}")]
    SystemTimeCalculation(PathBuf, #[source] SystemTimeError),
}

impl FetchError {
    /// Errors that will fail for every point alike, so continuing the run is pointless.
    pub fn is_fatal(&self) -> bool {
        match self {
            FetchError::ClientBuild(_) | FetchError::InvalidUrl { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                *status == reqwest::StatusCode::UNAUTHORIZED
                    || *status == reqwest::StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }
}
