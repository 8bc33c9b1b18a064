//! Where observations are persisted, and what is already there.

pub mod batch;
pub mod error;
pub mod file;
pub mod postgres;

use crate::store::batch::SinkReport;
use crate::store::error::StoreError;
use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::collections::HashSet;

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Ids of every city with at least one stored observation.
    async fn stored_city_ids(&self) -> Result<HashSet<i32>, StoreError>;

    /// The stored table to merge fresh rows into, if the sink needs the merge done
    /// client-side. Sinks that resolve key conflicts themselves return `None`.
    async fn load_existing(&self) -> Result<Option<DataFrame>, StoreError>;

    /// Writes the merged table. Failed batches are reported, not returned as errors.
    async fn persist(&self, observations: DataFrame) -> Result<SinkReport, StoreError>;
}
