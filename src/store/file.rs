use crate::frames::merge::conform;
use crate::store::batch::{FailedBatch, SinkReport};
use crate::store::error::StoreError;
use crate::store::ObservationStore;
use crate::types::observation::COL_CITY_ID;
use crate::utils::ensure_dir_exists;
use async_trait::async_trait;
use log::{error, info, warn};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

/// Datetime layout of CSV output, readable by the usual dataframe tools.
const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// On-disk encodings of the observation table, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    /// Arrow IPC, also known as Feather v2.
    Feather,
    Parquet,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("feather" | "arrow" | "ipc") => Ok(FileFormat::Feather),
            Some("parquet") => Ok(FileFormat::Parquet),
            _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn read(self, path: &Path) -> Result<DataFrame, StoreError> {
        let decode = |e: PolarsError| StoreError::FileDecode(path.to_path_buf(), e);
        match self {
            FileFormat::Csv => CsvReadOptions::default()
                .with_has_header(true)
                .with_ignore_errors(true)
                .map_parse_options(|options| options.with_try_parse_dates(true))
                .try_into_reader_with_file_path(Some(path.to_path_buf()))
                .map_err(decode)?
                .finish()
                .map_err(decode),
            FileFormat::Feather => {
                let file =
                    File::open(path).map_err(|e| StoreError::FileOpen(path.to_path_buf(), e))?;
                IpcReader::new(file).finish().map_err(decode)
            }
            FileFormat::Parquet => {
                let file =
                    File::open(path).map_err(|e| StoreError::FileOpen(path.to_path_buf(), e))?;
                ParquetReader::new(file).finish().map_err(decode)
            }
        }
    }

    fn write<W: Write>(self, df: &mut DataFrame, writer: W) -> PolarsResult<()> {
        match self {
            FileFormat::Csv => CsvWriter::new(writer)
                .include_header(true)
                .with_datetime_format(Some(CSV_DATETIME_FORMAT.to_string()))
                .finish(df),
            FileFormat::Feather => IpcWriter::new(writer).finish(df),
            FileFormat::Parquet => ParquetWriter::new(writer)
                .with_compression(ParquetCompression::Snappy)
                .finish(df)
                .map(|_| ()),
        }
    }
}

/// Observation table kept in a single CSV, Feather or Parquet file.
///
/// The whole table is rewritten on every persist. The new content goes to a temp
/// file next to the destination which is then renamed over it, so readers never
/// see a half-written table.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: FileFormat,
    output: PathBuf,
    output_format: FileFormat,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let format = FileFormat::from_path(&path)?;
        Ok(Self {
            output: path.clone(),
            output_format: format,
            path,
            format,
        })
    }

    /// Writes merged tables to `output` instead of back over the input file.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let output = output.into();
        self.output_format = FileFormat::from_path(&output)?;
        self.output = output;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// The file holding what is already stored.
    ///
    /// A separate output replaces the input once it exists, since every persist
    /// writes the input rows merged with the fetched ones into it.
    async fn source(&self) -> (&Path, FileFormat) {
        if self.output != self.path {
            if let Ok(metadata) = fs::metadata(&self.output).await {
                if metadata.len() > 0 {
                    return (&self.output, self.output_format);
                }
            }
        }
        (&self.path, self.format)
    }

    /// The stored table as written, or `None` if nothing is stored yet.
    async fn read_raw(&self) -> Result<Option<DataFrame>, StoreError> {
        let (source, format) = self.source().await;
        match fs::metadata(source).await {
            Ok(metadata) if metadata.len() == 0 => {
                warn!("Observation file {} is empty", source.display());
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No observation file at {}, starting empty", source.display());
                return Ok(None);
            }
            Err(e) => return Err(StoreError::FileMetadata(source.to_path_buf(), e)),
        }

        let path = source.to_path_buf();
        let df = task::spawn_blocking(move || format.read(&path)).await??;
        info!("Loaded {} stored rows from {}", df.height(), source.display());
        Ok(Some(df))
    }

    async fn write(&self, mut df: DataFrame) -> Result<(), StoreError> {
        let output = self.output.clone();
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir_exists(&dir)
            .await
            .map_err(|e| StoreError::FileWriteIo(dir.clone(), e))?;

        let format = self.output_format;
        task::spawn_blocking(move || {
            let mut temp = NamedTempFile::new_in(&dir)
                .map_err(|e| StoreError::FileWriteIo(output.clone(), e))?;
            format
                .write(&mut df, temp.as_file_mut())
                .map_err(|e| StoreError::FileEncode(output.clone(), e))?;
            temp.as_file_mut()
                .sync_all()
                .map_err(|e| StoreError::FileWriteIo(output.clone(), e))?;
            temp.persist(&output)
                .map_err(|e| StoreError::FileWriteIo(output.clone(), e.error))?;
            Ok::<(), StoreError>(())
        })
        .await??;
        Ok(())
    }
}

#[async_trait]
impl ObservationStore for FileStore {
    async fn stored_city_ids(&self) -> Result<HashSet<i32>, StoreError> {
        let Some(df) = self.read_raw().await? else {
            return Ok(HashSet::new());
        };
        let ids = df.column(COL_CITY_ID)?.cast(&DataType::Int32)?;
        Ok(ids.i32()?.into_iter().flatten().collect())
    }

    async fn load_existing(&self) -> Result<Option<DataFrame>, StoreError> {
        match self.read_raw().await? {
            Some(df) => Ok(Some(conform(&df)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, observations: DataFrame) -> Result<SinkReport, StoreError> {
        let rows = observations.height();
        let mut report = SinkReport {
            batches: 1,
            ..Default::default()
        };
        match self.write(observations).await {
            Ok(()) => {
                info!("Saved {} rows to {}", rows, self.output.display());
                report.rows_written = rows;
            }
            Err(e) => {
                error!("Failed to save {}: {}", self.output.display(), e);
                report.failed.push(FailedBatch {
                    index: 0,
                    offset: 0,
                    rows,
                    reason: e.to_string(),
                });
            }
        }
        Ok(report)
    }
}
