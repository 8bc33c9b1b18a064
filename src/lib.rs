mod cities;
mod config;
mod error;
mod fetch;
mod frames;
mod gap;
mod pace;
mod store;
mod sync;
mod types;
mod utils;

pub use error::CityWeatherError;
pub use sync::*;

pub use crate::config::error::ConfigError;
pub use crate::config::settings::*;
pub use crate::config::sync_config::*;

pub use cities::csv::CsvCitySource;
pub use cities::error::CitySourceError;
pub use cities::postgres::PgCitySource;
pub use cities::{filter_region, CitySource};
pub use gap::missing_points;

pub use fetch::cache::ResponseCache;
pub use fetch::client::OpenMeteoClient;
pub use fetch::error::FetchError;
pub use fetch::request::*;
pub use fetch::response::{timestamp_range, HourlyEnvelope, VariableSeries};
pub use fetch::WeatherSource;

pub use frames::error::FrameError;
pub use frames::merge::{conform, merge_observations};
pub use frames::normalize::normalize;

pub use pace::{Pause, TokioPause};

pub use store::batch::{write_batched, BatchWriter, FailedBatch, SinkReport};
pub use store::error::StoreError;
pub use store::file::{FileFormat, FileStore};
pub use store::postgres::{connect as connect_postgres, ensure_schema, PostgresStore};
pub use store::ObservationStore;

pub use types::geo_point::GeoPoint;
pub use types::observation::*;
pub use types::variable::{HourlyVariable, VariableKind};
