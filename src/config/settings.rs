//! Settings file and environment overrides.
//!
//! Values are layered: built-in defaults, then `config/city-weather.{toml,yaml,json}`
//! (or the file given on the command line), then `CITY_WEATHER__SECTION__KEY`
//! environment variables.

use crate::config::error::ConfigError;
use crate::config::sync_config::{DateWindow, SyncConfig, GAP_FILL_START};
use crate::fetch::cache::ResponseCache;
use crate::fetch::request::{DEFAULT_ARCHIVE_URL, DEFAULT_TEMPORAL_RESOLUTION, DEFAULT_TIMEZONE};
use crate::sync::SyncMode;
use crate::utils::get_cache_dir;
use chrono::NaiveDate;
use ::config::{Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config/city-weather";
pub const ENV_PREFIX: &str = "CITY_WEATHER";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub sync: SyncSettings,
    pub gap_fill: GapFillSettings,
    pub refresh: RefreshSettings,
    pub cities: CitiesSettings,
    pub observations: ObservationsSettings,
    pub database: Option<DatabaseSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timezone: String,
    pub temporal_resolution: String,
    /// Only needed for the commercial endpoints.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// Defaults to a directory under the user cache dir.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    pub region_filter: Option<String>,
    pub batch_size: usize,
    pub rate_limit_delay_ms: u64,
    pub failure_cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GapFillSettings {
    pub start_date: NaiveDate,
    /// Today when unset.
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSettings {
    pub days_back: u32,
    pub days_ahead: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CitiesSettings {
    Csv { path: PathBuf },
    Postgres { table: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationsSettings {
    /// `.csv`, `.feather` or `.parquet`; `output` defaults to `path`.
    ///
    /// With a separate `output`, that file is read back as the stored set once it
    /// exists, and `path` only seeds the first run.
    File {
        path: PathBuf,
        output: Option<PathBuf>,
    },
    Postgres { table: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Settings {
    /// Loads settings from `path` (required) or from the default file (optional).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = ::config::Config::builder()
            .set_default("api.base_url", DEFAULT_ARCHIVE_URL)?
            .set_default("api.timezone", DEFAULT_TIMEZONE)?
            .set_default("api.temporal_resolution", DEFAULT_TEMPORAL_RESOLUTION)?
            .set_default("api.timeout_secs", 60)?
            .set_default("api.cache.enabled", true)?
            .set_default("api.cache.ttl_secs", 3600)?
            .set_default("sync.batch_size", 500)?
            .set_default("sync.rate_limit_delay_ms", 1000)?
            .set_default("sync.failure_cooldown_ms", 5000)?
            .set_default("gap_fill.start_date", GAP_FILL_START.to_string())?
            .set_default("refresh.days_back", 7)?
            .set_default("refresh.days_ahead", 7)?
            .set_default("cities.kind", "csv")?
            .set_default("cities.path", "city_data_good.csv")?
            .set_default("observations.kind", "file")?
            .set_default("observations.path", "weather_slice.feather")?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn window(&self, mode: SyncMode) -> DateWindow {
        match mode {
            SyncMode::GapFill => DateWindow::Since {
                start: self.gap_fill.start_date,
                end: self.gap_fill.end_date,
            },
            SyncMode::Refresh => DateWindow::Rolling {
                days_back: self.refresh.days_back,
                days_ahead: self.refresh.days_ahead,
            },
        }
    }

    /// Run options for `mode`, with the date window resolved against `today`.
    pub fn sync_config(&self, mode: SyncMode, today: NaiveDate) -> Result<SyncConfig, ConfigError> {
        let (start_date, end_date) = self.window(mode).resolve(today);
        let config = SyncConfig::builder()
            .start_date(start_date)
            .end_date(end_date)
            .maybe_region_filter(self.sync.region_filter.clone())
            .batch_size(self.sync.batch_size)
            .rate_limit_delay(Duration::from_millis(self.sync.rate_limit_delay_ms))
            .failure_cooldown(Duration::from_millis(self.sync.failure_cooldown_ms))
            .timezone(self.api.timezone.clone())
            .temporal_resolution(self.api.temporal_resolution.clone())
            .build();
        config.validate()?;
        Ok(config)
    }

    pub fn database(&self, purpose: &'static str) -> Result<&DatabaseSettings, ConfigError> {
        self.database
            .as_ref()
            .ok_or(ConfigError::MissingDatabase { purpose })
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn response_cache(&self) -> Result<Option<ResponseCache>, ConfigError> {
        if !self.cache.enabled {
            return Ok(None);
        }
        let dir = match &self.cache.dir {
            Some(dir) => dir.clone(),
            None => get_cache_dir().ok_or(ConfigError::CacheDirResolution)?,
        };
        Ok(Some(ResponseCache::new(
            &dir,
            Duration::from_secs(self.cache.ttl_secs),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn load(contents: &str) -> Result<Settings, ConfigError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("city-weather.toml");
        std::fs::write(&path, contents).unwrap();
        Settings::load(Some(&path))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_fill_an_empty_file() -> Result<(), ConfigError> {
        let settings = load("")?;
        assert_eq!(settings.api.base_url, DEFAULT_ARCHIVE_URL);
        assert_eq!(settings.api.temporal_resolution, "hourly_6");
        assert_eq!(settings.api.timeout(), Duration::from_secs(60));
        assert!(settings.api.cache.enabled);
        assert_eq!(settings.sync.batch_size, 500);
        assert_eq!(settings.gap_fill.start_date, date(1985, 5, 30));
        assert_eq!(
            settings.cities,
            CitiesSettings::Csv {
                path: PathBuf::from("city_data_good.csv")
            }
        );
        assert_eq!(
            settings.observations,
            ObservationsSettings::File {
                path: PathBuf::from("weather_slice.feather"),
                output: None
            }
        );
        assert!(settings.database.is_none());
        Ok(())
    }

    #[test]
    fn test_file_values_and_sync_config() -> Result<(), ConfigError> {
        let settings = load(
            r#"
            [sync]
            region_filter = "Иркутская область"
            batch_size = 250
            rate_limit_delay_ms = 0
            failure_cooldown_ms = 10000

            [gap_fill]
            start_date = "2000-01-01"
            end_date = "2000-12-31"

            [observations]
            kind = "postgres"
            table = "weather_buffer"

            [database]
            host = "localhost"
            port = 5432
            user = "postgres"
            password = "secret"
            dbname = "weather"
            "#,
        )?;

        let config = settings.sync_config(SyncMode::GapFill, date(2025, 1, 1))?;
        assert_eq!(config.start_date, date(2000, 1, 1));
        assert_eq!(config.end_date, date(2000, 12, 31));
        assert_eq!(config.region_filter.as_deref(), Some("Иркутская область"));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.rate_limit_delay, Duration::ZERO);
        assert_eq!(config.failure_cooldown, Duration::from_secs(10));

        let refresh = settings.sync_config(SyncMode::Refresh, date(2025, 1, 10))?;
        assert_eq!((refresh.start_date, refresh.end_date), (date(2025, 1, 3), date(2025, 1, 17)));

        assert_eq!(
            settings.observations,
            ObservationsSettings::Postgres {
                table: "weather_buffer".to_string()
            }
        );
        assert_eq!(settings.database("upsert")?.port, 5432);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let reversed = load("[gap_fill]\nstart_date = \"2020-01-01\"\nend_date = \"2019-01-01\"\n")
            .unwrap()
            .sync_config(SyncMode::GapFill, date(2025, 1, 1));
        assert!(matches!(reversed, Err(ConfigError::InvalidDateRange { .. })));

        let settings = load("").unwrap();
        assert!(matches!(
            settings.database("postgres sink"),
            Err(ConfigError::MissingDatabase { .. })
        ));

        assert!(matches!(
            load("[sync]\nbatch_size = \"many\"\n"),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/city-weather.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_environment_overrides_file() -> Result<(), ConfigError> {
        std::env::set_var("CITY_WEATHER__API__API_KEY", "from-env");
        let settings = load("[api]\napi_key = \"from-file\"\n");
        std::env::remove_var("CITY_WEATHER__API__API_KEY");
        assert_eq!(settings?.api.api_key.as_deref(), Some("from-env"));
        Ok(())
    }

    #[test]
    fn test_response_cache_toggle() -> Result<(), ConfigError> {
        let settings = load("[api.cache]\nenabled = false\n")?;
        assert!(settings.api.response_cache()?.is_none());

        let settings = load("[api.cache]\ndir = \"/tmp/city-weather-test-cache\"\n")?;
        let cache = settings.api.response_cache()?.unwrap();
        assert_eq!(cache.dir(), Path::new("/tmp/city-weather-test-cache"));
        Ok(())
    }
}
