use crate::config::settings::DatabaseSettings;
use crate::store::batch::{write_batched, BatchWriter, SinkReport};
use crate::store::error::StoreError;
use crate::store::ObservationStore;
use crate::types::observation::{observation_columns, rows_from_frame, ObservationRow};
use crate::types::observation::{COL_CITY_ID, COL_DATE, OBSERVATION_WIDTH};
use async_trait::async_trait;
use log::info;
use polars::prelude::DataFrame;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use std::time::Duration;

const CITY_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS city (
    id INTEGER PRIMARY KEY,
    name TEXT,
    region TEXT,
    federal_district TEXT,
    population BIGINT,
    foundation_year INTEGER,
    status TEXT,
    old_name TEXT,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION
)";

const CITY_BUFFER_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS city_buffer (
    id INTEGER PRIMARY KEY,
    name TEXT,
    region TEXT,
    federal_district TEXT,
    population BIGINT,
    foundation_year INTEGER,
    status TEXT,
    old_name TEXT,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION
)";

const OBSERVATION_COLUMNS_SQL: &str = "date TIMESTAMP,
    temperature_2m DOUBLE PRECISION,
    relative_humidity_2m DOUBLE PRECISION,
    rain DOUBLE PRECISION,
    snowfall DOUBLE PRECISION,
    snow_depth DOUBLE PRECISION,
    is_day BOOLEAN,
    precipitation DOUBLE PRECISION,
    wind_direction_100m DOUBLE PRECISION,
    wind_speed_100m DOUBLE PRECISION,
    PRIMARY KEY (city_id, date)";

/// Accepts `name` or `schema.name` made of ASCII letters, digits and underscores.
pub(crate) fn validate_identifier(name: &str) -> Result<&str, StoreError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if name.split('.').count() <= 2 && name.split('.').all(valid_part) {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, StoreError> {
    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(&settings.password)
        .database(&settings.dbname);
    info!(
        "Connecting to postgres://{}@{}:{}/{}",
        settings.user, settings.host, settings.port, settings.dbname
    );
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(StoreError::Connect)
}

/// Creates the city and observation tables if they do not exist yet.
///
/// `weather` references `city(id)`; `weather_buffer` is the unconstrained
/// landing table the near-term refresh writes into.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    let weather = format!(
        "CREATE TABLE IF NOT EXISTS weather (\n    city_id INTEGER REFERENCES city(id),\n    {OBSERVATION_COLUMNS_SQL}\n)"
    );
    let weather_buffer = format!(
        "CREATE TABLE IF NOT EXISTS weather_buffer (\n    city_id INTEGER,\n    {OBSERVATION_COLUMNS_SQL}\n)"
    );
    let statements = [
        ("city", CITY_TABLE_SQL.to_string()),
        ("city_buffer", CITY_BUFFER_TABLE_SQL.to_string()),
        ("weather", weather),
        ("weather_buffer", weather_buffer),
    ];
    for (table, sql) in statements {
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|source| StoreError::Query {
                table: table.to_string(),
                source,
            })?;
        info!("Table {} is ready", table);
    }
    Ok(())
}

/// `INSERT ... ON CONFLICT (city_id, date) DO UPDATE` for one batch of rows.
fn upsert_query<'a>(table: &str, rows: &'a [ObservationRow]) -> QueryBuilder<'a, Postgres> {
    let columns = observation_columns();
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        table,
        columns.join(", ")
    ));
    builder.push_values(rows, |mut values, row| {
        values
            .push_bind(row.city_id)
            .push_bind(row.date)
            .push_bind(row.temperature)
            .push_bind(row.relative_humidity)
            .push_bind(row.rain)
            .push_bind(row.snowfall)
            .push_bind(row.snow_depth)
            .push_bind(row.is_day)
            .push_bind(row.precipitation)
            .push_bind(row.wind_direction)
            .push_bind(row.wind_speed);
    });
    let updates = columns
        .iter()
        .filter(|c| **c != COL_CITY_ID && **c != COL_DATE)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    builder.push(format!(
        " ON CONFLICT ({COL_CITY_ID}, {COL_DATE}) DO UPDATE SET {updates}"
    ));
    builder
}

/// Most rows one upsert can carry: Postgres binds at most 65535 parameters per statement.
pub const MAX_UPSERT_ROWS: usize = u16::MAX as usize / OBSERVATION_WIDTH;

fn check_batch_size(batch_size: usize) -> Result<usize, StoreError> {
    if batch_size > MAX_UPSERT_ROWS {
        return Err(StoreError::BatchTooLarge {
            size: batch_size,
            max: MAX_UPSERT_ROWS,
        });
    }
    Ok(batch_size)
}

/// Observation table in Postgres, written by batched upserts.
///
/// Conflicting keys are resolved by the database, so the stored table is never read
/// back in full.
pub struct PostgresStore {
    pool: PgPool,
    table: String,
    batch_size: usize,
}

impl PostgresStore {
    pub fn new(pool: PgPool, table: &str, batch_size: usize) -> Result<Self, StoreError> {
        Ok(Self {
            pool,
            table: validate_identifier(table)?.to_string(),
            batch_size: check_batch_size(batch_size)?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn query_error(&self, source: sqlx::Error) -> StoreError {
        StoreError::Query {
            table: self.table.clone(),
            source,
        }
    }
}

#[async_trait]
impl BatchWriter for PostgresStore {
    async fn write_batch(&self, batch: &DataFrame) -> Result<(), StoreError> {
        let rows = rows_from_frame(batch)?;
        upsert_query(&self.table, &rows)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(())
    }
}

#[async_trait]
impl ObservationStore for PostgresStore {
    async fn stored_city_ids(&self) -> Result<HashSet<i32>, StoreError> {
        let sql = format!("SELECT DISTINCT {COL_CITY_ID} FROM {}", self.table);
        let ids = sqlx::query_scalar::<_, Option<i32>>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(ids.into_iter().flatten().collect())
    }

    async fn load_existing(&self) -> Result<Option<DataFrame>, StoreError> {
        Ok(None)
    }

    async fn persist(&self, observations: DataFrame) -> Result<SinkReport, StoreError> {
        info!(
            "Upserting {} rows into {} in batches of {}",
            observations.height(),
            self.table,
            self.batch_size
        );
        Ok(write_batched(&observations, self.batch_size, self).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(city_id: i32, hour: u32) -> ObservationRow {
        ObservationRow {
            city_id,
            date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            temperature: Some(-3.0),
            relative_humidity: None,
            rain: None,
            snowfall: None,
            snow_depth: None,
            is_day: Some(true),
            precipitation: None,
            wind_direction: None,
            wind_speed: None,
        }
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("weather").is_ok());
        assert!(validate_identifier("weather_buffer").is_ok());
        assert!(validate_identifier("public.weather").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());

        for bad in ["", "1weather", "weather; DROP TABLE city", "a.b.c", "wea-ther", "w\""] {
            assert!(
                matches!(validate_identifier(bad), Err(StoreError::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_batch_size_fits_bind_limit() {
        assert_eq!(MAX_UPSERT_ROWS, 5957);
        assert!(check_batch_size(500).is_ok());
        assert!(check_batch_size(MAX_UPSERT_ROWS).is_ok());
        assert!(matches!(
            check_batch_size(6000),
            Err(StoreError::BatchTooLarge { size: 6000, max: 5957 })
        ));

        let rows: Vec<ObservationRow> = (0..MAX_UPSERT_ROWS).map(|i| row(i as i32, 0)).collect();
        let query = upsert_query("weather", &rows);
        let sql = query.sql();
        assert!(sql.contains("$65527)"));
        assert!(!sql.contains("$65528"));
    }

    #[test]
    fn test_upsert_statement_layout() {
        let rows = [row(1, 0), row(1, 6)];
        let query = upsert_query("weather_buffer", &rows);
        let sql = query.sql();

        assert!(sql.starts_with(
            "INSERT INTO weather_buffer (city_id, date, temperature_2m, relative_humidity_2m, rain, snowfall, snow_depth, is_day, precipitation, wind_direction_100m, wind_speed_100m) VALUES "
        ));
        assert!(sql.contains("$22)"));
        assert!(!sql.contains("$23"));
        assert!(sql.contains("ON CONFLICT (city_id, date) DO UPDATE SET temperature_2m = EXCLUDED.temperature_2m"));
        assert!(sql.ends_with("wind_speed_100m = EXCLUDED.wind_speed_100m"));
        assert!(!sql.contains("city_id = EXCLUDED"));
    }
}
