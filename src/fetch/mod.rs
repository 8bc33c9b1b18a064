//! Observation fetching: request parameters, the weather API client, its response
//! envelope and the on-disk response cache.

pub mod cache;
pub mod client;
pub mod error;
pub mod request;
pub mod response;

use crate::fetch::error::FetchError;
use crate::fetch::request::HourlyRequest;
use crate::fetch::response::HourlyEnvelope;
use async_trait::async_trait;

/// Anything that can answer an hourly request for one point.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_hourly(&self, request: &HourlyRequest) -> Result<HourlyEnvelope, FetchError>;
}
