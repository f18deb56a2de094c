//! Planar geometry checks for route adherence and geofences.
//!
//! Coordinates are treated as points on a flat plane measured in degrees.
//! Neither check is geodesic: `is_on_route` compares each axis independently
//! against a fixed threshold.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::Coordinate;

/// Default per-axis route deviation allowance, in degrees.
pub const DEFAULT_ROUTE_THRESHOLD: f64 = 0.0005;

/// Ray-casting point-in-polygon test.
///
/// The polygon is an open ring: the last vertex connects back to the first.
/// Fewer than three vertices is degenerate and never contains anything.
/// Points lying exactly on an edge may be classified either way.
pub fn point_in_polygon(point: Coordinate, polygon: &[Coordinate]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    for (i, a) in polygon.iter().enumerate() {
        let b = &polygon[(i + 1) % n];

        // Half-open span so a vertex shared by two edges toggles once.
        // Horizontal edges (a.lat == b.lat) never satisfy it.
        let (lo, hi) = if a.lat < b.lat {
            (a.lat, b.lat)
        } else {
            (b.lat, a.lat)
        };
        if !(lo < point.lat && point.lat <= hi) {
            continue;
        }

        let lon_at_lat = a.lon + (point.lat - a.lat) * (b.lon - a.lon) / (b.lat - a.lat);
        if point.lon <= lon_at_lat {
            inside = !inside;
        }
    }
    inside
}

/// Returns true if `point` is within `threshold` of some single waypoint on
/// both axes independently.
///
/// An empty route is never "on route".
pub fn is_on_route(point: Coordinate, route: &[Coordinate], threshold: f64) -> bool {
    route.iter().any(|waypoint| {
        (point.lat - waypoint.lat).abs() <= threshold
            && (point.lon - waypoint.lon).abs() <= threshold
    })
}

/// A named polygon used to classify points as inside or outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub name: String,
    pub points: Vec<Coordinate>,
}

impl Geofence {
    pub fn new(name: impl Into<String>, points: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Check the geofence is a usable polygon.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidGeofence("name must not be empty".into()));
        }
        if self.points.len() < 3 {
            return Err(CoreError::InvalidGeofence(format!(
                "'{}' needs at least 3 points, got {}",
                self.name,
                self.points.len()
            )));
        }
        self.points.iter().try_for_each(Coordinate::validate)
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        point_in_polygon(point, &self.points)
    }
}
