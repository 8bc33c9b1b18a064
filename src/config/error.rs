use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load settings")]
    Load(#[from] ::config::ConfigError),

    #[error("End date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("{purpose} needs a [database] section with connection settings")]
    MissingDatabase { purpose: &'static str },

    #[error("Failed to determine cache directory, set api.cache.dir")]
    CacheDirResolution,
}
