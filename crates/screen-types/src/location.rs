use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete world coordinate that hosts one screen.
///
/// Equality and hashing are exact-integer; this is the cache key everywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Center point of the cell, used for distance math.
    pub fn center(&self) -> (f64, f64, f64) {
        (
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }

    /// Squared distance from `point` to the cell center.
    pub fn distance_sq_to(&self, point: (f64, f64, f64)) -> f64 {
        let (cx, cy, cz) = self.center();
        let dx = cx - point.0;
        let dy = cy - point.1;
        let dz = cz - point.2;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Error returned when a `x,y,z` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLocationError(String);

impl fmt::Display for ParseLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid location {:?} (expected x,y,z)", self.0)
    }
}

impl std::error::Error for ParseLocationError {}

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseLocationError(s.to_string());
        let mut parts = s.split(',').map(|p| p.trim().parse::<i32>());
        let x = parts.next().ok_or_else(err)?.map_err(|_| err())?;
        let y = parts.next().ok_or_else(err)?.map_err(|_| err())?;
        let z = parts.next().ok_or_else(err)?.map_err(|_| err())?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self { x, y, z })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let loc: Location = "1,-64, 3".parse().unwrap();
        assert_eq!(loc, Location::new(1, -64, 3));
        assert_eq!(loc.to_string(), "1,-64,3");
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        assert!("1,2".parse::<Location>().is_err());
        assert!("1,2,3,4".parse::<Location>().is_err());
        assert!("a,b,c".parse::<Location>().is_err());
    }

    #[test]
    fn distance_is_measured_from_cell_center() {
        let loc = Location::new(0, 0, 0);
        assert_eq!(loc.distance_sq_to((0.5, 0.5, 0.5)), 0.0);
        assert_eq!(loc.distance_sq_to((10.5, 0.5, 0.5)), 100.0);
    }
}
