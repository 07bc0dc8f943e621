//! Geographic coordinates and service zones.
//!
//! `GeoPoint` uses `f32` latitude/longitude, ~1 m precision at the equator,
//! which is plenty for matching positions against an operator zone.

use crate::{CoreError, CoreResult};

/// A WGS-84 coordinate stored as single-precision floats.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f32,
    pub lon: f32,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f32 {
        const R: f32 = 6_371_000.0; // mean Earth radius, metres

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);
        R * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

// ── Zone ──────────────────────────────────────────────────────────────────────

/// A simple polygon delimiting an operator's service area.
///
/// Vertices are given in order; the ring is closed implicitly.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Zone {
    vertices: Vec<GeoPoint>,
}

impl Zone {
    /// Build a zone, rejecting rings with fewer than three vertices.
    pub fn new(vertices: Vec<GeoPoint>) -> CoreResult<Self> {
        if vertices.len() < 3 {
            return Err(CoreError::Config(format!(
                "service zone needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    /// Even-odd ray casting on the (lon, lat) plane.
    pub fn contains(&self, point: GeoPoint) -> bool {
        let (x, y) = (point.lon, point.lat);
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let (xi, yi) = (self.vertices[i].lon, self.vertices[i].lat);
            let (xj, yj) = (self.vertices[j].lon, self.vertices[j].lat);
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}
