//! The incremental sync: enumerate cities, find the ones without data, fetch them,
//! merge with what is stored and persist.

use crate::cities::{filter_region, CitySource};
use crate::config::error::ConfigError;
use crate::config::sync_config::SyncConfig;
use crate::error::CityWeatherError;
use crate::fetch::request::HourlyRequest;
use crate::fetch::WeatherSource;
use crate::frames::merge::merge_observations;
use crate::frames::normalize::normalize;
use crate::gap::missing_points;
use crate::pace::{Pause, TokioPause};
use crate::store::batch::SinkReport;
use crate::store::ObservationStore;
use crate::types::geo_point::GeoPoint;
use log::{error, info, warn};
use polars::prelude::DataFrame;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Fetch the full window for cities with no stored observations.
    GapFill,
    /// Re-fetch a short window for every city and overwrite by key.
    Refresh,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::GapFill => write!(f, "gap fill"),
            SyncMode::Refresh => write!(f, "refresh"),
        }
    }
}

/// Result of fetching one point. Fatal errors are not outcomes, they end the run.
#[derive(Debug)]
pub enum PointOutcome {
    Fetched(DataFrame),
    Skipped {
        point: GeoPoint,
        error: CityWeatherError,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Cities left after the region filter.
    pub candidates: usize,
    /// Cities that were requested.
    pub missing: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub new_rows: usize,
    /// Rows in the merged table handed to the sink.
    pub total_rows: usize,
    pub sink: SinkReport,
}

pub struct WeatherSync<S, P = TokioPause> {
    source: S,
    pause: P,
    config: SyncConfig,
}

impl<S: WeatherSource> WeatherSync<S, TokioPause> {
    pub fn new(source: S, config: SyncConfig) -> Result<Self, ConfigError> {
        Self::with_pause(source, TokioPause, config)
    }
}

impl<S: WeatherSource, P: Pause> WeatherSync<S, P> {
    pub fn with_pause(source: S, pause: P, config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            source,
            pause,
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn fetch_point(&self, point: &GeoPoint) -> Result<DataFrame, CityWeatherError> {
        let request = HourlyRequest::for_point(
            point,
            self.config.start_date,
            self.config.end_date,
            &self.config.timezone,
            &self.config.temporal_resolution,
        );
        let envelope = self.source.fetch_hourly(&request).await?;
        Ok(normalize(point.id, &envelope)?)
    }

    /// Fetches `points` one after another.
    ///
    /// A recoverable failure skips the point after `failure_cooldown`; a success is
    /// followed by `rate_limit_delay`. The first fatal error stops the loop and is
    /// returned.
    pub async fn fetch_points(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<PointOutcome>, CityWeatherError> {
        let mut outcomes = Vec::with_capacity(points.len());
        for (idx, point) in points.iter().enumerate() {
            info!(
                "[{}/{}] Fetching {} (id {})",
                idx + 1,
                points.len(),
                point.name,
                point.id
            );
            match self.fetch_point(point).await {
                Ok(df) => {
                    info!("Added {} rows for city id={}", df.height(), point.id);
                    outcomes.push(PointOutcome::Fetched(df));
                    self.pause.pause(self.config.rate_limit_delay).await;
                }
                Err(e) if e.is_fatal() => {
                    error!("Aborting at city id={}: {}", point.id, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping city id={} ({}): {}", point.id, point.name, e);
                    outcomes.push(PointOutcome::Skipped {
                        point: point.clone(),
                        error: e,
                    });
                    self.pause.pause(self.config.failure_cooldown).await;
                }
            }
        }
        Ok(outcomes)
    }

    pub async fn run(
        &self,
        cities: &dyn CitySource,
        store: &dyn ObservationStore,
        mode: SyncMode,
    ) -> Result<SyncReport, CityWeatherError> {
        let mut report = SyncReport::default();
        info!(
            "Starting {} for {} .. {}",
            mode, self.config.start_date, self.config.end_date
        );

        let points = filter_region(
            cities.load_points().await?,
            self.config.region_filter.as_deref(),
        );
        report.candidates = points.len();
        if points.is_empty() {
            warn!("No cities to sync");
            return Ok(report);
        }

        let targets = match mode {
            SyncMode::GapFill => {
                let stored = store.stored_city_ids().await?;
                missing_points(&points, &stored)
            }
            SyncMode::Refresh => points,
        };
        report.missing = targets.len();
        info!(
            "{} of {} cities to fetch",
            report.missing, report.candidates
        );
        if targets.is_empty() {
            warn!("Every city already has observations, nothing to fetch");
            return Ok(report);
        }

        let mut fresh: Option<DataFrame> = None;
        for outcome in self.fetch_points(&targets).await? {
            match outcome {
                PointOutcome::Fetched(df) => {
                    report.fetched += 1;
                    match fresh.as_mut() {
                        Some(all) => {
                            all.vstack_mut(&df)?;
                        }
                        None => fresh = Some(df),
                    }
                }
                PointOutcome::Skipped { .. } => report.skipped += 1,
            }
        }

        let fresh = match fresh {
            Some(df) if df.height() > 0 => df,
            _ => {
                warn!("No new observations received");
                return Ok(report);
            }
        };
        report.new_rows = fresh.height();

        let stored = store.load_existing().await?;
        let merged = merge_observations(stored.as_ref(), &fresh)?;
        report.total_rows = merged.height();
        report.sink = store.persist(merged).await?;

        info!(
            "Finished {}: {} fetched, {} skipped, {} new rows, {} rows written",
            mode, report.fetched, report.skipped, report.new_rows, report.sink.rows_written
        );
        Ok(report)
    }
}
