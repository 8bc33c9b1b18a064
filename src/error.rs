use crate::cities::error::CitySourceError;
use crate::config::error::ConfigError;
use crate::fetch::error::FetchError;
use crate::frames::error::FrameError;
use crate::store::error::StoreError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CityWeatherError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    CitySource(#[from] CitySourceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}

impl CityWeatherError {
    /// Whether the run must stop. Only per-point fetch and response problems are
    /// recoverable.
    pub fn is_fatal(&self) -> bool {
        match self {
            CityWeatherError::Fetch(e) => e.is_fatal(),
            CityWeatherError::Frame(e) => e.is_fatal(),
            _ => true,
        }
    }
}
