use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CitySourceError {
    #[error("Failed to read city extract '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("City extract '{path}' has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("'{0}' is not a plain SQL identifier")]
    InvalidTable(String),

    #[error("Failed to read cities from table '{table}'")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
