use crate::fetch::error::FetchError;
use crate::types::variable::HourlyVariable;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Response carries {found} variables, expected {expected}")]
    VariableCount { expected: usize, found: usize },

    #[error("Variable at position {position} is '{found}', expected '{expected}'")]
    SchemaMismatch {
        position: usize,
        expected: HourlyVariable,
        found: HourlyVariable,
    },

    #[error(transparent)]
    Envelope(#[from] FetchError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}

impl FrameError {
    /// Layout errors repeat for every point, so they stop the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FrameError::Envelope(_))
    }
}
