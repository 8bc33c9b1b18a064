use crate::cities::error::CitySourceError;
use crate::cities::CitySource;
use crate::types::geo_point::GeoPoint;
use async_trait::async_trait;
use log::{debug, info, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::task;

/// City extract stored as CSV with at least `id`, `name` (or `city`), `latitude`
/// and `longitude` columns. `region` is optional.
#[derive(Debug, Clone)]
pub struct CsvCitySource {
    path: PathBuf,
}

impl CsvCitySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn required<'a>(df: &'a DataFrame, path: &Path, column: &'static str) -> Result<&'a Column, CitySourceError> {
    df.column(column)
        .map_err(|_| CitySourceError::MissingColumn {
            path: path.to_path_buf(),
            column,
        })
}

fn points_from_frame(df: &DataFrame, path: &Path) -> Result<Vec<GeoPoint>, CitySourceError> {
    let height = df.height();
    let ids = required(df, path, "id")?.cast(&DataType::Int32)?;
    let names = match df.column("name").or_else(|_| df.column("city")) {
        Ok(column) => column.cast(&DataType::String)?,
        Err(_) => {
            return Err(CitySourceError::MissingColumn {
                path: path.to_path_buf(),
                column: "name",
            })
        }
    };
    let regions = match df.column("region") {
        Ok(column) => column.cast(&DataType::String)?,
        Err(_) => Column::from(Series::full_null("region".into(), height, &DataType::String)),
    };
    let latitudes = required(df, path, "latitude")?.cast(&DataType::Float64)?;
    let longitudes = required(df, path, "longitude")?.cast(&DataType::Float64)?;

    let (ids, names, regions) = (ids.i32()?, names.str()?, regions.str()?);
    let (latitudes, longitudes) = (latitudes.f64()?, longitudes.f64()?);

    let mut points = Vec::with_capacity(height);
    for idx in 0..height {
        match (ids.get(idx), latitudes.get(idx), longitudes.get(idx)) {
            (Some(id), Some(latitude), Some(longitude)) => points.push(GeoPoint {
                id,
                name: names.get(idx).unwrap_or_default().to_string(),
                region: regions.get(idx).map(str::to_string),
                latitude,
                longitude,
            }),
            (Some(id), _, _) => debug!("City {} has no coordinates, skipping", id),
            (None, _, _) => warn!("Row {} of {} has no id, skipping", idx, path.display()),
        }
    }
    Ok(points)
}

#[async_trait]
impl CitySource for CsvCitySource {
    async fn load_points(&self) -> Result<Vec<GeoPoint>, CitySourceError> {
        let path = self.path.clone();
        let points = task::spawn_blocking(move || {
            let df = CsvReadOptions::default()
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(path.clone()))
                .map_err(|e| CitySourceError::CsvRead(path.clone(), e))?
                .finish()
                .map_err(|e| CitySourceError::CsvRead(path.clone(), e))?;
            points_from_frame(&df, &path)
        })
        .await??;
        info!("Loaded {} cities from {}", points.len(), self.path.display());
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const EXTRACT: &str = "\
id,name,region,federal_district,population,foundation_year,status,old_name,latitude,longitude
1,Иркутск,Иркутская область,Сибирский,617473,1661,город,,52.2978,104.2964
2,Ангарск,Иркутская область,Сибирский,221296,1948,город,,52.5448,103.8885
3,Безымянск,Иркутская область,Сибирский,1000,1900,город,,,
4,Красноярск,Красноярский край,Сибирский,1187771,1628,город,,56.0153,92.8932
";

    #[tokio::test]
    async fn test_loads_points_with_coordinates() -> Result<(), CitySourceError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("city_data_good.csv");
        std::fs::write(&path, EXTRACT).unwrap();

        let points = CsvCitySource::new(&path).load_points().await?;
        let ids: Vec<i32> = points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert_eq!(points[0].name, "Иркутск");
        assert_eq!(points[0].region.as_deref(), Some("Иркутская область"));
        assert_eq!(points[2].latitude, 56.0153);
        Ok(())
    }

    #[tokio::test]
    async fn test_accepts_city_column_and_missing_region() -> Result<(), CitySourceError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities_with_coordinates.csv");
        std::fs::write(&path, "id,city,latitude,longitude\n7,Братск,56.1514,101.6340\n").unwrap();

        let points = CsvCitySource::new(&path).load_points().await?;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name, "Братск");
        assert_eq!(points[0].region, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_coordinate_column_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cities.csv");
        std::fs::write(&path, "id,name,latitude\n1,Иркутск,52.3\n").unwrap();

        let result = CsvCitySource::new(&path).load_points().await;
        assert!(matches!(
            result,
            Err(CitySourceError::MissingColumn {
                column: "longitude",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = CsvCitySource::new("/nonexistent/city_data_good.csv");
        assert!(matches!(
            source.load_points().await,
            Err(CitySourceError::CsvRead(..))
        ));
    }
}
