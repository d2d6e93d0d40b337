use std::fmt;

use geo_types::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses `"lat,lon"` (whitespace around either part is ignored).
    pub fn parse(text: &str) -> Option<Self> {
        let (lat, lon) = text.split_once(',')?;
        let latitude: f64 = lat.trim().parse().ok()?;
        let longitude: f64 = lon.trim().parse().ok()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        Some(Self::new(latitude, longitude))
    }

    /// Great-circle distance in km.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        const R: f64 = 6372.8; // Radius of the earth in km

        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();

        let a = f64::sin(d_lat / 2.).powi(2)
            + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
        let c = 2. * f64::asin(f64::sqrt(a));

        R * c
    }
}

// Used as the display name whenever reverse geocoding has nothing better.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

impl From<Coordinate> for Point {
    fn from(value: Coordinate) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

/// A named location: a geocoding candidate, a trip destination or a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub coordinate: Coordinate,
}

impl Place {
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
        }
    }
}
