//! Loading the cities to keep observations for.

pub mod csv;
pub mod error;
pub mod postgres;

use crate::cities::error::CitySourceError;
use crate::types::geo_point::GeoPoint;
use async_trait::async_trait;

/// An extract of cities with coordinates, read once per run.
#[async_trait]
pub trait CitySource: Send + Sync {
    /// Every usable city in extract order.
    async fn load_points(&self) -> Result<Vec<GeoPoint>, CitySourceError>;
}

/// Keeps the points whose region equals `region` exactly. `None` keeps everything.
pub fn filter_region(points: Vec<GeoPoint>, region: Option<&str>) -> Vec<GeoPoint> {
    match region {
        Some(region) => points.into_iter().filter(|p| p.in_region(region)).collect(),
        None => points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: i32, region: Option<&str>) -> GeoPoint {
        GeoPoint {
            id,
            name: format!("city {id}"),
            region: region.map(str::to_string),
            latitude: 52.0,
            longitude: 104.0,
        }
    }

    #[test]
    fn test_region_filter_is_exact() {
        let points = vec![
            point(1, Some("Иркутская область")),
            point(2, Some("Иркутская область ")),
            point(3, None),
            point(4, Some("Иркутская область")),
        ];
        let kept: Vec<i32> = filter_region(points.clone(), Some("Иркутская область"))
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(kept, vec![1, 4]);
        assert_eq!(filter_region(points, None).len(), 4);
    }
}
