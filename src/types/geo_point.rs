//! The city record the sync works on.

use serde::{Deserialize, Serialize};

/// A city with a stable identifier and coordinates.
///
/// Produced by an upstream extract (scraped city list plus geocoding) and only read
/// here. Points without coordinates never become a `GeoPoint`; they are dropped while
/// loading the extract.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeoPoint {
    /// Primary key of the `city` table, referenced as `city_id` by observations.
    pub id: i32,
    pub name: String,
    /// Federal subject the city belongs to (e.g. "Иркутская область").
    pub region: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl GeoPoint {
    pub fn in_region(&self, region: &str) -> bool {
        self.region.as_deref() == Some(region)
    }
}
