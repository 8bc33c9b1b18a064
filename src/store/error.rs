use crate::frames::error::FrameError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unsupported observation file '{0}', expected .csv, .feather, .arrow, .ipc or .parquet")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read metadata for observation file '{0}'")]
    FileMetadata(PathBuf, #[source] std::io::Error),

    #[error("Failed to open observation file '{0}'")]
    FileOpen(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode observation file '{0}'")]
    FileDecode(PathBuf, #[source] PolarsError),

    // Errors while writing through the temp file (inside blocking task)
    #[error("I/O error writing observation file '{0}'")]
    FileWriteIo(PathBuf, #[source] std::io::Error),
    #[error("Encoding error writing observation file '{0}'")]
    FileEncode(PathBuf, #[source] PolarsError),

    #[error("'{0}' is not a plain SQL identifier")]
    InvalidIdentifier(String),

    #[error("Batch size {size} exceeds {max} rows, the most one upsert statement can bind")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Failed to connect to the database")]
    Connect(#[source] sqlx::Error),

    #[error("Database query on table '{table}' failed")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
