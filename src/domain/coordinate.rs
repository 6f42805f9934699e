//! Integer lattice coordinates and Manhattan distance.
//!
//! All positions in the service live on a 2-D integer grid. Distance is
//! always Manhattan (|Δlat| + |Δlon|); there is no road network.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A point on the integer grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    /// Grid latitude.
    pub latitude: i32,
    /// Grid longitude.
    pub longitude: i32,
}

impl Coordinate {
    /// Creates a coordinate from its two components.
    #[must_use]
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Manhattan distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: Coordinate) -> i32 {
        (self.latitude - other.latitude).abs() + (self.longitude - other.longitude).abs()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_manhattan() {
        let a = Coordinate::new(0, 0);
        let b = Coordinate::new(3, -4);
        assert_eq!(a.distance_to(b), 7);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(-2, 9);
        let b = Coordinate::new(5, 1);
        assert_eq!(a.distance_to(b), b.distance_to(a));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = Coordinate::new(42, -17);
        assert_eq!(a.distance_to(a), 0);
    }

    #[test]
    fn serde_field_names() {
        let a = Coordinate::new(1, 2);
        let json = serde_json::to_string(&a).ok();
        assert_eq!(json.as_deref(), Some(r#"{"latitude":1,"longitude":2}"#));
    }
}
