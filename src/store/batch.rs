use crate::store::error::StoreError;
use async_trait::async_trait;
use log::{error, info};
use polars::prelude::DataFrame;

/// Writes one slice of the observation frame to a sink.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    async fn write_batch(&self, batch: &DataFrame) -> Result<(), StoreError>;
}

/// A batch the sink rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedBatch {
    pub index: usize,
    /// Row offset of the batch within the written frame.
    pub offset: usize,
    pub rows: usize,
    pub reason: String,
}

/// What a persist call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkReport {
    pub batches: usize,
    pub rows_written: usize,
    pub failed: Vec<FailedBatch>,
}

impl SinkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn rows_failed(&self) -> usize {
        self.failed.iter().map(|f| f.rows).sum()
    }
}

/// Writes `frame` in consecutive slices of at most `batch_size` rows.
///
/// A failed batch is logged and recorded in the report; later batches are still
/// attempted. Earlier batches are never rolled back.
pub async fn write_batched<W>(frame: &DataFrame, batch_size: usize, writer: &W) -> SinkReport
where
    W: BatchWriter + ?Sized,
{
    let total = frame.height();
    let batch_size = batch_size.max(1);
    let mut report = SinkReport::default();

    for (index, offset) in (0..total).step_by(batch_size).enumerate() {
        let batch = frame.slice(offset as i64, batch_size);
        let rows = batch.height();
        report.batches += 1;

        match writer.write_batch(&batch).await {
            Ok(()) => {
                report.rows_written += rows;
                info!("Uploaded {} / {} rows", offset + rows, total);
            }
            Err(e) => {
                error!(
                    "Batch {} (rows {}..{}) failed: {}",
                    index,
                    offset,
                    offset + rows,
                    e
                );
                report.failed.push(FailedBatch {
                    index,
                    offset,
                    rows,
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        sizes: Mutex<Vec<usize>>,
        first_values: Mutex<Vec<i32>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl BatchWriter for RecordingWriter {
        async fn write_batch(&self, batch: &DataFrame) -> Result<(), StoreError> {
            let call = {
                let mut sizes = self.sizes.lock().unwrap();
                sizes.push(batch.height());
                sizes.len() - 1
            };
            let first = batch.column("n")?.i32()?.get(0).unwrap();
            self.first_values.lock().unwrap().push(first);
            if self.fail_on == Some(call) {
                return Err(StoreError::InvalidIdentifier("rejected".into()));
            }
            Ok(())
        }
    }

    fn numbered(rows: i32) -> DataFrame {
        DataFrame::new(vec![Column::new("n".into(), (0..rows).collect::<Vec<i32>>())]).unwrap()
    }

    #[tokio::test]
    async fn test_frame_is_sliced_into_fixed_batches() {
        let writer = RecordingWriter::default();
        let report = write_batched(&numbered(1200), 500, &writer).await;

        assert_eq!(*writer.sizes.lock().unwrap(), vec![500, 500, 200]);
        assert_eq!(*writer.first_values.lock().unwrap(), vec![0, 500, 1000]);
        assert_eq!(report.batches, 3);
        assert_eq!(report.rows_written, 1200);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let writer = RecordingWriter {
            fail_on: Some(1),
            ..Default::default()
        };
        let report = write_batched(&numbered(1200), 500, &writer).await;

        assert_eq!(writer.sizes.lock().unwrap().len(), 3);
        assert_eq!(report.rows_written, 700);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert_eq!(report.failed[0].offset, 500);
        assert_eq!(report.rows_failed(), 500);
    }

    #[tokio::test]
    async fn test_empty_frame_writes_nothing() {
        let writer = RecordingWriter::default();
        let report = write_batched(&numbered(0), 500, &writer).await;
        assert!(writer.sizes.lock().unwrap().is_empty());
        assert_eq!(report, SinkReport::default());
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_batch() {
        let writer = RecordingWriter::default();
        write_batched(&numbered(1000), 500, &writer).await;
        assert_eq!(*writer.sizes.lock().unwrap(), vec![500, 500]);
    }
}
