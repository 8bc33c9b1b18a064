//! Which cities still have no observations at all.

use crate::types::geo_point::GeoPoint;
use std::collections::HashSet;

/// Points whose id does not appear in `stored_ids`, in source order.
///
/// Coverage is all-or-nothing: a city with a single stored row counts as done.
pub fn missing_points(points: &[GeoPoint], stored_ids: &HashSet<i32>) -> Vec<GeoPoint> {
    points
        .iter()
        .filter(|p| !stored_ids.contains(&p.id))
        .cloned()
        .collect()
}
