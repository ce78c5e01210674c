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

//! NAT track feed decoding.

use std::collections::BTreeSet;

use log::{debug, warn};
use serde::Deserialize;

use super::{FeedParser, ParseError};
use crate::geo::{Coordinate, Waypoint};

/// Direction of flow on a published track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackDirection {
    #[default]
    Unknown,
    West,
    East,
}

impl TrackDirection {
    /// Map the feed's numeric direction. Anything other than 0 or 1 is east.
    #[must_use]
    pub fn from_feed(value: i64) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::West,
            _ => Self::East,
        }
    }
}

/// A published oceanic track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Track letter or identifier, unique within one publication.
    pub identifier: String,
    /// Track message identifier of the publication this track belongs to.
    pub tmi: String,
    pub direction: TrackDirection,
    /// Ordered route points.
    pub route: Vec<Waypoint>,
    /// Permitted flight levels.
    pub flight_levels: BTreeSet<u32>,
}

impl Track {
    /// A track without route points cannot be used to expand a clearance.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.route.is_empty()
    }

    /// Route point names in order.
    #[must_use]
    pub fn route_names(&self) -> Vec<&str> {
        self.route.iter().map(|w| w.name.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawRoutePoint {
    name: String,
    latitude: f64,
    longitude: f64,
}

impl RawRoutePoint {
    fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    id: String,
    tmi: String,
    direction: i64,
    route: Vec<RawRoutePoint>,
    #[serde(rename = "flightLevels")]
    flight_levels: Vec<serde_json::Value>,
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        let flight_levels = raw
            .flight_levels
            .iter()
            .filter_map(|value| {
                let level = value.as_u64().and_then(|v| u32::try_from(v).ok());
                if level.is_none() {
                    debug!("Track {}: ignoring flight level {}", raw.id, value);
                }
                level
            })
            .collect();

        Self {
            identifier: raw.id,
            tmi: raw.tmi,
            direction: TrackDirection::from_feed(raw.direction),
            route: raw
                .route
                .into_iter()
                .map(|p| Waypoint::new(p.name, Coordinate::new(p.latitude, p.longitude)))
                .collect(),
            flight_levels,
        }
    }
}

/// Parser for the track feed: a JSON array of track objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackParser;

impl FeedParser for TrackParser {
    type Output = Vec<Track>;

    fn parse(&self, body: &[u8]) -> Result<Self::Output, ParseError> {
        let raw: Vec<RawTrack> = serde_json::from_slice(body)?;

        let mut tracks = Vec::with_capacity(raw.len());
        for track in raw {
            if track.id.trim().is_empty() {
                warn!("Skipping track with a blank identifier (TMI {})", track.tmi);
                continue;
            }
            if let Some(point) = track.route.iter().find(|p| !p.is_in_range()) {
                warn!(
                    "Skipping track {}: point {} at {},{} is out of range",
                    track.id, point.name, point.latitude, point.longitude
                );
                continue;
            }
            tracks.push(Track::from(track));
        }
        Ok(tracks)
    }
}
