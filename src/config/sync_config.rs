use crate::config::error::ConfigError;
use crate::fetch::request::{DEFAULT_TEMPORAL_RESOLUTION, DEFAULT_TIMEZONE};
use bon::Builder;
use chrono::{NaiveDate, TimeDelta};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(5);

/// First day of the historical archive fill.
pub const GAP_FILL_START: NaiveDate = match NaiveDate::from_ymd_opt(1985, 5, 30) {
    Some(date) => date,
    None => panic!("invalid gap fill start date"),
};

/// The closed date interval a run requests for every point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// Everything from `start` up to `end`, or up to today when `end` is `None`.
    Since {
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
    /// A window around today.
    Rolling { days_back: u32, days_ahead: u32 },
}

impl DateWindow {
    pub fn gap_fill() -> Self {
        DateWindow::Since {
            start: GAP_FILL_START,
            end: None,
        }
    }

    pub fn refresh() -> Self {
        DateWindow::Rolling {
            days_back: 7,
            days_ahead: 7,
        }
    }

    /// `(start_date, end_date)`, both inclusive.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            DateWindow::Since { start, end } => (start, end.unwrap_or(today)),
            DateWindow::Rolling {
                days_back,
                days_ahead,
            } => (
                today - TimeDelta::days(i64::from(days_back)),
                today + TimeDelta::days(i64::from(days_ahead)),
            ),
        }
    }
}

/// Options of one sync run.
///
/// # Examples
///
/// ```
/// use city_weather::SyncConfig;
/// use chrono::NaiveDate;
/// use std::time::Duration;
///
/// let config = SyncConfig::builder()
///     .start_date(NaiveDate::from_ymd_opt(1985, 5, 30).unwrap())
///     .end_date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
///     .region_filter("Иркутская область")
///     .failure_cooldown(Duration::from_secs(10))
///     .build();
/// assert_eq!(config.batch_size, 500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SyncConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Only cities whose region equals this exactly are synced.
    #[builder(into)]
    pub region_filter: Option<String>,
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Pause after every successful request.
    #[builder(default = DEFAULT_RATE_LIMIT_DELAY)]
    pub rate_limit_delay: Duration,
    /// Pause after a failed request, instead of the rate limit delay.
    #[builder(default = DEFAULT_FAILURE_COOLDOWN)]
    pub failure_cooldown: Duration,
    #[builder(into, default = DEFAULT_TIMEZONE.to_string())]
    pub timezone: String,
    #[builder(into, default = DEFAULT_TEMPORAL_RESOLUTION.to_string())]
    pub temporal_resolution: String,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_date < self.start_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let config = SyncConfig::builder()
            .start_date(date(2024, 1, 1))
            .end_date(date(2024, 1, 1))
            .build();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.rate_limit_delay, Duration::from_secs(1));
        assert_eq!(config.failure_cooldown, Duration::from_secs(5));
        assert_eq!(config.timezone, "Asia/Irkutsk");
        assert_eq!(config.temporal_resolution, "hourly_6");
        assert_eq!(config.region_filter, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let reversed = SyncConfig::builder()
            .start_date(date(2024, 2, 1))
            .end_date(date(2024, 1, 1))
            .build();
        assert!(matches!(
            reversed.validate(),
            Err(ConfigError::InvalidDateRange { .. })
        ));

        let zero_batch = SyncConfig::builder()
            .start_date(date(2024, 1, 1))
            .end_date(date(2024, 1, 2))
            .batch_size(0)
            .build();
        assert!(matches!(zero_batch.validate(), Err(ConfigError::ZeroBatchSize)));
    }

    #[test]
    fn test_windows_resolve_against_today() {
        let today = date(2025, 3, 4);
        assert_eq!(
            DateWindow::gap_fill().resolve(today),
            (date(1985, 5, 30), today)
        );
        assert_eq!(
            DateWindow::refresh().resolve(today),
            (date(2025, 2, 25), date(2025, 3, 11))
        );
        let fixed = DateWindow::Since {
            start: date(2020, 1, 1),
            end: Some(date(2020, 12, 31)),
        };
        assert_eq!(fixed.resolve(today), (date(2020, 1, 1), date(2020, 12, 31)));
    }
}
