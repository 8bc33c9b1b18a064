use crate::cities::error::CitySourceError;
use crate::cities::CitySource;
use crate::store::postgres::validate_identifier;
use crate::types::geo_point::GeoPoint;
use async_trait::async_trait;
use log::{debug, info};
use sqlx::PgPool;

type CityRecord = (i32, Option<String>, Option<String>, Option<f64>, Option<f64>);

/// Cities read from a table shaped like `city` (`id, name, region, latitude, longitude`).
pub struct PgCitySource {
    pool: PgPool,
    table: String,
}

impl PgCitySource {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, CitySourceError> {
        let table = validate_identifier(table)
            .map_err(|_| CitySourceError::InvalidTable(table.to_string()))?
            .to_string();
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl CitySource for PgCitySource {
    async fn load_points(&self) -> Result<Vec<GeoPoint>, CitySourceError> {
        let sql = format!(
            "SELECT id, name, region, latitude, longitude FROM {} ORDER BY id",
            self.table
        );
        let records = sqlx::query_as::<_, CityRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| CitySourceError::Query {
                table: self.table.clone(),
                source,
            })?;

        let points: Vec<GeoPoint> = records
            .into_iter()
            .filter_map(|(id, name, region, latitude, longitude)| {
                match (latitude, longitude) {
                    (Some(latitude), Some(longitude)) => Some(GeoPoint {
                        id,
                        name: name.unwrap_or_default(),
                        region,
                        latitude,
                        longitude,
                    }),
                    _ => {
                        debug!("City {} has no coordinates, skipping", id);
                        None
                    }
                }
            })
            .collect();
        info!("Loaded {} cities from table {}", points.len(), self.table);
        Ok(points)
    }
}
