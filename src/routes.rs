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

//! Route resolution.
//!
//! Turns a clearance string into an ordered list of positioned waypoints.
//! A track clearance expands to the loaded track's points; anything else is
//! resolved token by token against hints, the fix database and raw
//! coordinate forms.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use natrak_client::geo::parse_coordinate_token;
use natrak_client::{Coordinate, Waypoint};
use thiserror::Error;

use crate::flight_plan::FlightPlan;
use crate::tracks::{TrackSet, TrackStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("track {0} is not in the current publication")]
    UnknownTrack(String),

    #[error("track {0} has no route points")]
    UnusableTrack(String),
}

/// A queued route resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub callsign: String,
    /// Track label for track routes, otherwise the raw route string.
    pub raw: String,
    pub is_track_route: bool,
    /// Named points already resolved for this flight.
    pub hints: Vec<Waypoint>,
    /// Route generation of the record the request was built from.
    pub generation: u64,
}

impl RouteRequest {
    /// Request matching a plan's current clearance.
    #[must_use]
    pub fn for_plan(plan: &FlightPlan, hints: Vec<Waypoint>) -> Self {
        let is_track_route = plan.is_on_track();
        Self {
            callsign: plan.callsign.clone(),
            raw: if is_track_route {
                plan.track.clone()
            } else {
                plan.route_raw.clone()
            },
            is_track_route,
            hints,
            generation: plan.route_generation,
        }
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub route: Vec<Waypoint>,
    /// Identifier of the expanded track, `None` for a random route.
    pub track: Option<String>,
}

/// Named fixes known to the overlay.
#[derive(Debug, Default)]
pub struct FixDatabase {
    fixes: RwLock<HashMap<String, Coordinate>>,
}

impl FixDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<'a>(&self, waypoints: impl IntoIterator<Item = &'a Waypoint>) {
        let mut fixes = self.fixes.write().unwrap_or_else(PoisonError::into_inner);
        for waypoint in waypoints {
            fixes.insert(waypoint.name.to_ascii_uppercase(), waypoint.position);
        }
    }

    /// Add only the names the database does not know yet.
    pub fn insert_missing<'a>(&self, waypoints: impl IntoIterator<Item = &'a Waypoint>) {
        let mut fixes = self.fixes.write().unwrap_or_else(PoisonError::into_inner);
        for waypoint in waypoints {
            fixes
                .entry(waypoint.name.to_ascii_uppercase())
                .or_insert(waypoint.position);
        }
    }

    /// Add every point of a track publication.
    pub fn seed_from_tracks(&self, tracks: &TrackSet) {
        self.insert(tracks.route_points());
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Coordinate> {
        self.fixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_ascii_uppercase())
            .copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fixes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    #[allow(dead_code, reason = "pairs with len")]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves [`RouteRequest`]s against the current tracks and known fixes.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    tracks: Arc<TrackStore>,
    fixes: Arc<FixDatabase>,
}

impl RouteResolver {
    #[must_use]
    pub fn new(tracks: Arc<TrackStore>, fixes: Arc<FixDatabase>) -> Self {
        Self { tracks, fixes }
    }

    pub fn resolve(&self, request: &RouteRequest) -> Result<ResolvedRoute, ResolveError> {
        if request.is_track_route {
            self.resolve_track(&request.raw)
        } else {
            Ok(ResolvedRoute {
                route: self.resolve_tokens(&request.callsign, &request.raw, &request.hints),
                track: None,
            })
        }
    }

    fn resolve_track(&self, label: &str) -> Result<ResolvedRoute, ResolveError> {
        let tracks = self.tracks.snapshot();
        let track = tracks
            .find(label)
            .ok_or_else(|| ResolveError::UnknownTrack(label.trim().to_string()))?;
        if !track.is_usable() {
            return Err(ResolveError::UnusableTrack(track.identifier.clone()));
        }
        Ok(ResolvedRoute {
            route: track.route.clone(),
            track: Some(track.identifier.clone()),
        })
    }

    fn resolve_tokens(&self, callsign: &str, raw: &str, hints: &[Waypoint]) -> Vec<Waypoint> {
        let mut route = Vec::new();
        for token in raw.split_whitespace() {
            let token = token.to_ascii_uppercase();
            if token == "DCT" || is_speed_level(&token) {
                continue;
            }

            // 55/20 is a coordinate; FIX/M084F350 carries a speed/level change
            let name = if parse_coordinate_token(&token).is_some() {
                token.as_str()
            } else {
                token.split('/').next().unwrap_or_default()
            };
            if name.is_empty() {
                continue;
            }

            match self.lookup(name, hints) {
                Some(position) => route.push(Waypoint::new(name, position)),
                None => debug!("{callsign}: dropping unresolved route token {token}"),
            }
        }
        route
    }

    fn lookup(&self, name: &str, hints: &[Waypoint]) -> Option<Coordinate> {
        hints
            .iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
            .map(|w| w.position)
            .or_else(|| self.fixes.lookup(name))
            .or_else(|| parse_coordinate_token(name))
    }
}

/// Speed/level groups such as `N0480F350`, `M084F370` or a bare `F350`.
fn is_speed_level(token: &str) -> bool {
    let rest = strip_group(token, &[('N', 4), ('K', 4), ('M', 3)]);
    let speed_found = rest.len() < token.len();
    let after = strip_group(rest, &[('F', 3), ('A', 3), ('S', 4), ('M', 4)]);
    let level_found = after.len() < rest.len();
    after.is_empty() && (speed_found || level_found)
}

fn strip_group<'a>(token: &'a str, groups: &[(char, usize)]) -> &'a str {
    for &(prefix, digits) in groups {
        if let Some(rest) = token.strip_prefix(prefix) {
            if rest.len() >= digits && rest.as_bytes()[..digits].iter().all(u8::is_ascii_digit) {
                return &rest[digits..];
            }
        }
    }
    token
}
