// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Geographic primitives shared by the feed and routing layers.
//!
//! Provides [`Coordinate`] and [`Waypoint`], great-circle distance, and a
//! parser for the raw coordinate tokens that appear in oceanic route strings.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_NM: f64 = 3440.065;

/// A latitude/longitude pair in decimal degrees (north and east positive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance to `other` in nautical miles.
    #[must_use]
    pub fn distance_nm(&self, other: &Coordinate) -> f64 {
        haversine_distance_nm(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A named route point with a resolved position. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub position: Coordinate,
}

impl Waypoint {
    #[must_use]
    pub fn new(name: impl Into<String>, position: Coordinate) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Calculate distance in nautical miles between two lat/lon points.
#[must_use]
pub fn haversine_distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_NM * c
}

/// Parse a raw coordinate token from a route string.
///
/// Supported forms:
/// - `55/20` and `5530/20`: NAT half-degree shorthand, always north/west
/// - `5520N`, `55N20`: ARINC 424 five-character points
/// - `55N020W`: whole degrees
/// - `5530N02000W`: degrees and minutes
///
/// Returns `None` for anything else, including out-of-range values.
#[must_use]
pub fn parse_coordinate_token(token: &str) -> Option<Coordinate> {
    let token = token.trim().to_ascii_uppercase();
    if !token.is_ascii() {
        return None;
    }

    let coordinate = if let Some((lat, lon)) = token.split_once('/') {
        parse_slash(lat, lon)
    } else {
        match token.len() {
            5 => parse_arinc(&token),
            7 | 11 => parse_icao(&token),
            _ => None,
        }
    }?;

    coordinate.is_in_range().then_some(coordinate)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn degrees_minutes(s: &str, degree_digits: usize) -> Option<f64> {
    if !all_digits(s) {
        return None;
    }
    let degrees: f64 = s[..degree_digits].parse().ok()?;
    let minutes: f64 = if s.len() > degree_digits {
        s[degree_digits..].parse().ok()?
    } else {
        0.0
    };
    if minutes >= 60.0 {
        return None;
    }
    Some(degrees + minutes / 60.0)
}

// Oceanic shorthand: latitude north, longitude west.
fn parse_slash(lat: &str, lon: &str) -> Option<Coordinate> {
    let latitude = match lat.len() {
        2 | 4 => degrees_minutes(lat, 2)?,
        _ => return None,
    };
    let longitude = match lon.len() {
        2 | 3 => degrees_minutes(lon, lon.len())?,
        4 => degrees_minutes(lon, 2)?,
        5 => degrees_minutes(lon, 3)?,
        _ => return None,
    };
    Some(Coordinate::new(latitude, -longitude))
}

// ARINC 424: the letter encodes the hemisphere pair, its position encodes
// whether 100 must be added to the longitude.
fn parse_arinc(token: &str) -> Option<Coordinate> {
    let bytes = token.as_bytes();
    let (digits, letter, add_hundred) = if bytes[4].is_ascii_alphabetic() {
        (token[..4].to_string(), bytes[4], false)
    } else if bytes[2].is_ascii_alphabetic() {
        (format!("{}{}", &token[..2], &token[3..]), bytes[2], true)
    } else {
        return None;
    };
    if !all_digits(&digits) {
        return None;
    }

    let latitude: f64 = digits[..2].parse().ok()?;
    let mut longitude: f64 = digits[2..].parse().ok()?;
    if add_hundred {
        longitude += 100.0;
    }

    let (lat_sign, lon_sign) = match letter {
        b'N' => (1.0, -1.0),
        b'E' => (1.0, 1.0),
        b'S' => (-1.0, 1.0),
        b'W' => (-1.0, -1.0),
        _ => return None,
    };
    Some(Coordinate::new(latitude * lat_sign, longitude * lon_sign))
}

fn parse_icao(token: &str) -> Option<Coordinate> {
    let lat_len = if token.len() == 7 { 2 } else { 4 };
    let lat_hemisphere = token.as_bytes()[lat_len];
    let lon_hemisphere = token.as_bytes()[token.len() - 1];

    let latitude = degrees_minutes(&token[..lat_len], 2)?;
    let longitude = degrees_minutes(&token[lat_len + 1..token.len() - 1], 3)?;

    let lat_sign = match lat_hemisphere {
        b'N' => 1.0,
        b'S' => -1.0,
        _ => return None,
    };
    let lon_sign = match lon_hemisphere {
        b'E' => 1.0,
        b'W' => -1.0,
        _ => return None,
    };
    Some(Coordinate::new(latitude * lat_sign, longitude * lon_sign))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Coordinate, lat: f64, lon: f64) {
        assert!((actual.latitude - lat).abs() < 1e-9, "latitude {actual:?}");
        assert!((actual.longitude - lon).abs() < 1e-9, "longitude {actual:?}");
    }

    #[test]
    fn test_haversine_distance_nm() {
        // One degree of latitude is 60 nm
        let distance = haversine_distance_nm(50.0, -30.0, 51.0, -30.0);
        assert!((distance - 60.0).abs() < 0.5);
    }

    #[test]
    fn test_slash_coordinates() {
        assert_close(parse_coordinate_token("55/20").unwrap(), 55.0, -20.0);
        assert_close(parse_coordinate_token("5530/20").unwrap(), 55.5, -20.0);
        assert_close(parse_coordinate_token("49/050").unwrap(), 49.0, -50.0);
    }

    #[test]
    fn test_arinc_coordinates() {
        assert_close(parse_coordinate_token("5520N").unwrap(), 55.0, -20.0);
        assert_close(parse_coordinate_token("55N20").unwrap(), 55.0, -120.0);
        assert_close(parse_coordinate_token("5010E").unwrap(), 50.0, 10.0);
        assert_close(parse_coordinate_token("4030W").unwrap(), -40.0, -30.0);
    }

    #[test]
    fn test_icao_coordinates() {
        assert_close(parse_coordinate_token("55N020W").unwrap(), 55.0, -20.0);
        assert_close(parse_coordinate_token("5530N02030W").unwrap(), 55.5, -20.5);
        assert_close(parse_coordinate_token("10s045e").unwrap(), -10.0, 45.0);
    }

    #[test]
    fn test_rejects_named_fixes_and_garbage() {
        assert!(parse_coordinate_token("ALLRY").is_none());
        assert!(parse_coordinate_token("DCT").is_none());
        assert!(parse_coordinate_token("N0480F350").is_none());
        assert!(parse_coordinate_token("5590N02000W").is_none());
        assert!(parse_coordinate_token("95/20").is_none());
        assert!(parse_coordinate_token("").is_none());
    }
}
