//! Geodesic distance and route-projection math
//!
//! All distances are great-circle (haversine) on a sphere of radius 6371 km.
//! Route projection uses a local equirectangular plane per polyline segment,
//! which is accurate to well under a meter at the segment lengths seen in
//! road navigation.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Validate that the coordinates lie within the WGS84 domain.
    ///
    /// Latitude must be in [-90, 90], longitude in [-180, 180]. NaN fails
    /// both comparisons and is rejected.
    pub fn validate(&self) -> Result<()> {
        let lat_ok = (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(Error::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Great-circle distance between two points in kilometers (haversine formula)
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Great-circle distance in meters
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_km(a, b) * 1000.0
}

/// Result of projecting a point onto a route polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteProjection {
    /// Distance from the point to the nearest point on the route, km
    pub offset_km: f64,
    /// Distance along the route from its start to the projected point, km
    pub along_km: f64,
}

/// Project a point onto a polyline.
///
/// Returns the perpendicular offset to the nearest point on any segment and
/// the cumulative along-route distance to that nearest point. Returns `None`
/// for polylines with fewer than two points.
pub fn project_onto_polyline(point: GeoPoint, polyline: &[GeoPoint]) -> Option<RouteProjection> {
    if polyline.len() < 2 {
        return None;
    }

    let mut best: Option<RouteProjection> = None;
    let mut along_to_segment_km = 0.0;

    for pair in polyline.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let segment_km = haversine_km(a, b);

        // Local equirectangular plane anchored at the segment start
        let cos_lat = a.latitude.to_radians().cos();
        let to_xy = |p: GeoPoint| -> (f64, f64) {
            let x = (p.longitude - a.longitude).to_radians() * cos_lat * EARTH_RADIUS_KM;
            let y = (p.latitude - a.latitude).to_radians() * EARTH_RADIUS_KM;
            (x, y)
        };

        let (bx, by) = to_xy(b);
        let (px, py) = to_xy(point);

        let seg_len_sq = bx * bx + by * by;
        let t = if seg_len_sq > 0.0 {
            ((px * bx + py * by) / seg_len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let nearest = GeoPoint::new(
            a.latitude + (b.latitude - a.latitude) * t,
            a.longitude + (b.longitude - a.longitude) * t,
        );
        let offset_km = haversine_km(point, nearest);

        if best.map_or(true, |p| offset_km < p.offset_km) {
            best = Some(RouteProjection {
                offset_km,
                along_km: along_to_segment_km + segment_km * t,
            });
        }

        along_to_segment_km += segment_km;
    }

    best
}
