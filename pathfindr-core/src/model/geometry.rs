use geo::{Distance, Euclidean, Haversine, Point};

/// Great-circle distance in metres between two lon/lat points.
pub fn geo_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Straight-line distance in raw degrees, used for proximity tests that are
/// expressed in degrees (e.g. waypoint hit thresholds).
pub fn planar_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    Euclidean.distance(a, b)
}

/// True when both coordinates carry at most two decimals.
///
/// Real map coordinates almost never do; a graph full of them means an
/// upstream conversion truncated the data (about 1 km resolution).
pub fn looks_rounded(point: Point<f64>) -> bool {
    has_at_most_two_decimals(point.x()) && has_at_most_two_decimals(point.y())
}

fn has_at_most_two_decimals(value: f64) -> bool {
    let scaled = value * 100.0;
    (scaled - scaled.round()).abs() < 1e-7
}
