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

//! Flight-data API decoding.
//!
//! The API answers with an array of at most one row. Every column is nullable
//! and nulls stay `None`; nothing is coerced to an empty string.

use serde::Deserialize;

use super::{FeedParser, ParseError};

/// Track label used for flights cleared on a random (non-track) route.
pub const RAW_ROUTE_TRACK: &str = "RR";

/// One row of the flight-data API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlightDataRow {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub logged_onto: Option<String>,
    #[serde(default)]
    pub assigned_level: Option<String>,
    #[serde(default)]
    pub assigned_mach: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
}

/// Authoritative clearance data for one flight.
///
/// Returned by value; the caller owns it. An invalid record means "no usable
/// data yet", whether the flight was unknown or the request failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightRecord {
    pub callsign: String,
    pub route: Option<String>,
    pub destination: Option<String>,
    pub logged_onto: Option<String>,
    pub assigned_level: Option<String>,
    pub assigned_mach: Option<String>,
    pub track: Option<String>,
    pub is_valid: bool,
}

impl FlightRecord {
    /// A record carrying no data for `callsign`.
    #[must_use]
    pub fn invalid(callsign: &str) -> Self {
        Self {
            callsign: callsign.to_string(),
            ..Default::default()
        }
    }

    /// Build a valid record from an API row. The row's own callsign wins when
    /// present.
    #[must_use]
    pub fn from_row(requested_callsign: &str, row: FlightDataRow) -> Self {
        Self {
            callsign: row
                .callsign
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| requested_callsign.to_string()),
            route: row.route,
            destination: row.destination,
            logged_onto: row.logged_onto,
            assigned_level: row.assigned_level,
            assigned_mach: row.assigned_mach,
            track: row.track,
            is_valid: true,
        }
    }

    /// Whether the clearance refers to a published track rather than a
    /// random route.
    #[must_use]
    pub fn is_track_route(&self) -> bool {
        self.track
            .as_deref()
            .map(str::trim)
            .is_some_and(|t| !t.is_empty() && t != RAW_ROUTE_TRACK)
    }
}

/// Parser for the flight-data API: a JSON array of rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlightDataParser;

impl FeedParser for FlightDataParser {
    type Output = Vec<FlightDataRow>;

    fn parse(&self, body: &[u8]) -> Result<Self::Output, ParseError> {
        Ok(serde_json::from_slice(body)?)
    }
}
