//! Parameters of one hourly archive request.

use crate::fetch::error::FetchError;
use crate::types::geo_point::GeoPoint;
use crate::types::variable::HourlyVariable;
use bon::Builder;
use chrono::NaiveDate;
use reqwest::Url;

pub const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
pub const DEFAULT_TIMEZONE: &str = "Asia/Irkutsk";
pub const DEFAULT_TEMPORAL_RESOLUTION: &str = "hourly_6";

/// A request for hourly observations of one point over a closed date interval.
///
/// # Examples
///
/// ```
/// use city_weather::HourlyRequest;
/// use chrono::NaiveDate;
///
/// let request = HourlyRequest::builder()
///     .latitude(52.29)
///     .longitude(104.28)
///     .start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
///     .end_date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
///     .build();
/// assert_eq!(request.timezone, "Asia/Irkutsk");
/// assert_eq!(request.variables.len(), 9);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct HourlyRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// First day requested (inclusive).
    pub start_date: NaiveDate,
    /// Last day requested (inclusive).
    pub end_date: NaiveDate,
    #[builder(into, default = DEFAULT_TIMEZONE.to_string())]
    pub timezone: String,
    #[builder(into, default = DEFAULT_TEMPORAL_RESOLUTION.to_string())]
    pub temporal_resolution: String,
    #[builder(default = HourlyVariable::ALL.to_vec())]
    pub variables: Vec<HourlyVariable>,
}

impl HourlyRequest {
    pub fn for_point(
        point: &GeoPoint,
        start_date: NaiveDate,
        end_date: NaiveDate,
        timezone: &str,
        temporal_resolution: &str,
    ) -> Self {
        HourlyRequest::builder()
            .latitude(point.latitude)
            .longitude(point.longitude)
            .start_date(start_date)
            .end_date(end_date)
            .timezone(timezone)
            .temporal_resolution(temporal_resolution)
            .build()
    }

    /// Query parameters in a stable order, so identical requests share a cache entry.
    pub fn query_pairs(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        let hourly = self
            .variables
            .iter()
            .map(|v| v.api_name())
            .collect::<Vec<_>>()
            .join(",");
        let mut pairs = vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("start_date", self.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", self.end_date.format("%Y-%m-%d").to_string()),
            ("hourly", hourly),
            ("timezone", self.timezone.clone()),
            ("temporal_resolution", self.temporal_resolution.clone()),
            ("timeformat", "unixtime".to_string()),
        ];
        if let Some(key) = api_key {
            pairs.push(("apikey", key.to_string()));
        }
        pairs
    }

    pub fn url(&self, base_url: &str, api_key: Option<&str>) -> Result<Url, FetchError> {
        Url::parse_with_params(base_url, self.query_pairs(api_key)).map_err(|e| {
            FetchError::InvalidUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Spacing of the records implied by `temporal_resolution` (`hourly_6` -> 6 h).
    ///
    /// Only needed when a response holds a single timestamp and the spacing cannot be
    /// read off the time axis.
    pub fn step_seconds(&self) -> i64 {
        self.temporal_resolution
            .strip_prefix("hourly_")
            .and_then(|hours| hours.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(1)
            * 3600
    }
}
