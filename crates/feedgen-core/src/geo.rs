//! Geographic coordinates and the planar projection used for local geometry.
//!
//! Physical lengths (line sections, pole spans) are always great-circle
//! distances. Clustering, snapping and MST ranking run on projected planar
//! coordinates so that Euclidean distance is meaningful.

use ::geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::error::{FeederError, FeederResult};

/// Mean earth radius in meters (IUGG), matching the radius `geo` uses for haversine.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Planar coordinate pair `[x, y]` as produced by a [`Projection`].
pub type PlanarPoint = [f64; 2];

/// Euclidean distance between two projected points.
#[inline]
pub fn planar_distance(a: &PlanarPoint, b: &PlanarPoint) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = FeederError;

    fn try_from(raw: RawGeoPoint) -> FeederResult<Self> {
        GeoPoint::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    /// Create a point, rejecting coordinates outside the valid degree ranges.
    pub fn new(latitude: f64, longitude: f64) -> FeederResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FeederError::InvalidConfiguration(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(FeederError::InvalidConfiguration(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in meters.
    pub fn haversine_m(&self, other: &GeoPoint) -> f64 {
        self.as_point().haversine_distance(&other.as_point())
    }

    /// Point at fraction `t` of the way from `self` to `other`.
    ///
    /// Interpolates in degree space, which is accurate for the sub-kilometre
    /// spans a pole split produces.
    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude + (other.latitude - self.latitude) * t,
            longitude: self.longitude + (other.longitude - self.longitude) * t,
        }
    }

    /// Arithmetic mean of a non-empty set of points.
    pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let latitude = points.iter().map(|p| p.latitude).sum::<f64>() / n;
        let longitude = points.iter().map(|p| p.longitude).sum::<f64>() / n;
        Some(GeoPoint {
            latitude,
            longitude,
        })
    }

    fn as_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// How geographic coordinates are flattened for planar geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    /// Raw `(longitude, latitude)` degrees.
    Geographic,
    /// Equirectangular projection in meters centred on an origin.
    #[default]
    LocalPlanar,
}

/// A projection bound to its origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    kind: ProjectionKind,
    origin: GeoPoint,
    cos_origin_lat: f64,
}

impl Projection {
    pub fn new(kind: ProjectionKind, origin: GeoPoint) -> Self {
        Self {
            kind,
            origin,
            cos_origin_lat: origin.latitude.to_radians().cos(),
        }
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    pub fn project(&self, point: &GeoPoint) -> PlanarPoint {
        match self.kind {
            ProjectionKind::Geographic => [point.longitude, point.latitude],
            ProjectionKind::LocalPlanar => [
                EARTH_RADIUS_M
                    * (point.longitude - self.origin.longitude).to_radians()
                    * self.cos_origin_lat,
                EARTH_RADIUS_M * (point.latitude - self.origin.latitude).to_radians(),
            ],
        }
    }

    /// Inverse of [`Projection::project`]. Fails if the result leaves the valid
    /// coordinate ranges.
    pub fn unproject(&self, planar: &PlanarPoint) -> FeederResult<GeoPoint> {
        match self.kind {
            ProjectionKind::Geographic => GeoPoint::new(planar[1], planar[0]),
            ProjectionKind::LocalPlanar => {
                let latitude = self.origin.latitude + (planar[1] / EARTH_RADIUS_M).to_degrees();
                let longitude = if self.cos_origin_lat.abs() < 1e-12 {
                    self.origin.longitude
                } else {
                    self.origin.longitude
                        + (planar[0] / (EARTH_RADIUS_M * self.cos_origin_lat)).to_degrees()
                };
                GeoPoint::new(latitude, longitude)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geopoint_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(1.0, 0.0).unwrap();
        // One degree of arc is ~111.19 km
        assert!((a.haversine_m(&b) - 111_195.0).abs() < 50.0);
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = GeoPoint::new(10.0, 20.0).unwrap();
        let b = GeoPoint::new(10.002, 20.004).unwrap();
        let mid = a.lerp(&b, 0.5);
        assert!((mid.latitude() - 10.001).abs() < 1e-12);
        assert!((mid.longitude() - 20.002).abs() < 1e-12);
    }

    #[test]
    fn test_local_planar_matches_haversine_for_short_distances() {
        let origin = GeoPoint::new(13.09, 80.27).unwrap();
        let p = GeoPoint::new(13.095, 80.275).unwrap();
        let proj = Projection::new(ProjectionKind::LocalPlanar, origin);
        let planar = proj.project(&p);
        let flat = planar_distance(&[0.0, 0.0], &planar);
        assert!((flat - origin.haversine_m(&p)).abs() / flat < 1e-3);
    }

    #[test]
    fn test_projection_round_trip() {
        let origin = GeoPoint::new(45.0, -122.0).unwrap();
        let p = GeoPoint::new(45.01, -121.98).unwrap();
        for kind in [ProjectionKind::Geographic, ProjectionKind::LocalPlanar] {
            let proj = Projection::new(kind, origin);
            let back = proj.unproject(&proj.project(&p)).unwrap();
            assert!((back.latitude() - p.latitude()).abs() < 1e-9);
            assert!((back.longitude() - p.longitude()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: GeoPoint = serde_json::from_str(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap();
        assert_eq!(ok.latitude(), 1.0);
        let bad: Result<GeoPoint, _> =
            serde_json::from_str(r#"{"latitude": 100.0, "longitude": 2.0}"#);
        assert!(bad.is_err());
    }
}
