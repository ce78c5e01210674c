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

//! Flight plan records held by the registry.

use std::fmt;

use chrono::NaiveTime;
use serde::Deserialize;

use natrak_client::{FlightRecord, Waypoint, RAW_ROUTE_TRACK};

/// Datalink and radio capability filed in the flight plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommMode {
    #[default]
    Voice,
    Text,
    ReceiveOnly,
}

impl CommMode {
    /// Map the host's single-letter code. Unknown codes are treated as voice.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('T') => Self::Text,
            Some('R') => Self::ReceiveOnly,
            _ => Self::Voice,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Voice => "VOX",
            Self::Text => "TXT",
            Self::ReceiveOnly => "RCV",
        }
    }
}

impl fmt::Display for CommMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flight plan as the host simulator reports it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostFlightPlan {
    pub callsign: String,
    pub aircraft_type: String,
    pub origin: String,
    pub destination: String,
    /// Filed departure time as an `HHMM` zulu string.
    pub estimated_departure_time: String,
    pub sector_exit_minutes: Option<i32>,
    /// Empty when no controller is tracking the flight.
    pub tracking_controller_id: String,
    pub remarks: String,
    pub communication_type: String,
    pub raw_route: String,
    /// Route points the host has already resolved, by name.
    pub route_points: Vec<Waypoint>,
    /// Track assigned by the host, if the flight is on one.
    pub assigned_track: Option<String>,
}

/// A flight known to the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightPlan {
    pub callsign: String,
    pub aircraft_type: String,
    pub origin: String,
    pub destination: String,
    pub etd: Option<NaiveTime>,
    pub exit_minutes: Option<i32>,
    /// Tracking controller, `None` when untracked.
    pub sector: Option<String>,
    /// Track label, `RR` for a random route.
    pub track: String,
    pub route: Vec<Waypoint>,
    pub route_raw: String,
    pub is_cleared: bool,
    pub communications: CommMode,
    pub selcal: Option<String>,
    pub current_message: Option<String>,
    pub assigned_level: Option<String>,
    pub assigned_mach: Option<String>,
    pub logged_onto: Option<String>,
    pub is_valid: bool,
    /// Bumped each time the route is queued for resolution. Results stamped
    /// with an older generation are stale.
    pub route_generation: u64,
}

/// Normalize a callsign for use as a registry key.
#[must_use]
pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_ascii_uppercase()
}

/// Pull the four-letter SELCAL code out of `SEL/ABCD` in the remarks.
#[must_use]
pub fn extract_selcal(remarks: &str) -> Option<String> {
    let start = remarks.find("SEL/")? + 4;
    let code: String = remarks[start..].chars().take(4).collect();
    let code = code.trim();
    (!code.is_empty()).then(|| code.to_string())
}

/// Parse an `HHMM` departure time. Leading zeros may be missing.
#[must_use]
pub fn parse_etd(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hhmm: u32 = value.parse().ok()?;
    NaiveTime::from_hms_opt(hhmm / 100, hhmm % 100, 0)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl FlightPlan {
    /// Placeholder returned for callsigns the registry does not hold.
    #[must_use]
    pub fn invalid(callsign: &str) -> Self {
        Self {
            callsign: normalize_callsign(callsign),
            aircraft_type: String::new(),
            origin: String::new(),
            destination: String::new(),
            etd: None,
            exit_minutes: None,
            sector: None,
            track: RAW_ROUTE_TRACK.to_string(),
            route: Vec::new(),
            route_raw: String::new(),
            is_cleared: false,
            communications: CommMode::Voice,
            selcal: None,
            current_message: None,
            assigned_level: None,
            assigned_mach: None,
            logged_onto: None,
            is_valid: false,
            route_generation: 0,
        }
    }

    /// Build a record from the host's flight plan.
    #[must_use]
    pub fn from_host(source: &HostFlightPlan) -> Self {
        let mut plan = Self {
            aircraft_type: source.aircraft_type.trim().to_string(),
            origin: source.origin.trim().to_string(),
            destination: source.destination.trim().to_string(),
            etd: parse_etd(&source.estimated_departure_time),
            exit_minutes: source.sector_exit_minutes,
            sector: non_empty(&source.tracking_controller_id),
            track: source
                .assigned_track
                .as_deref()
                .and_then(non_empty)
                .unwrap_or_else(|| RAW_ROUTE_TRACK.to_string()),
            route_raw: source.raw_route.trim().to_string(),
            communications: CommMode::from_code(&source.communication_type),
            selcal: extract_selcal(&source.remarks),
            ..Self::invalid(&source.callsign)
        };
        plan.refresh_validity();
        plan
    }

    /// A record is valid once type, origin, destination and departure time
    /// are all known.
    pub fn refresh_validity(&mut self) {
        self.is_valid = !self.callsign.is_empty()
            && !self.aircraft_type.is_empty()
            && !self.origin.is_empty()
            && !self.destination.is_empty()
            && self.etd.is_some();
    }

    #[must_use]
    pub fn is_on_track(&self) -> bool {
        !self.track.is_empty() && self.track != RAW_ROUTE_TRACK
    }

    /// Departure time as shown on the strip, e.g. `0930Z`.
    #[must_use]
    pub fn etd_zulu(&self) -> Option<String> {
        self.etd.map(|t| t.format("%H%MZ").to_string())
    }
}

/// One-line flight strip.
impl fmt::Display for FlightPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dash = |value: Option<&str>| value.unwrap_or("-").to_string();
        write!(
            f,
            "{:<8} {} {}-{} ETD {} TRK {} ({} pts) F{} M{} {} SEL/{} SECT {} EXIT {}",
            self.callsign,
            dash(Some(self.aircraft_type.as_str()).filter(|t| !t.is_empty())),
            dash(Some(self.origin.as_str()).filter(|o| !o.is_empty())),
            dash(Some(self.destination.as_str()).filter(|d| !d.is_empty())),
            dash(self.etd_zulu().as_deref()),
            self.track,
            self.route.len(),
            dash(self.assigned_level.as_deref()),
            dash(self.assigned_mach.as_deref()),
            self.communications,
            dash(self.selcal.as_deref()),
            dash(self.sector.as_deref()),
            self.exit_minutes.map_or_else(|| "-".to_string(), |m| m.to_string()),
        )?;
        if self.is_cleared {
            write!(f, " CLR")?;
        }
        if let Some(station) = &self.logged_onto {
            write!(f, " LOG {station}")?;
        }
        if let Some(message) = &self.current_message {
            write!(f, " MSG {message}")?;
        }
        if !self.route_raw.is_empty() {
            write!(f, " RTE {}", self.route_raw)?;
        }
        if !self.is_valid {
            write!(f, " [incomplete]")?;
        }
        Ok(())
    }
}

/// Fields to merge into an existing record. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightUpdate {
    pub destination: Option<String>,
    pub route_raw: Option<String>,
    pub track: Option<String>,
    pub assigned_level: Option<String>,
    pub assigned_mach: Option<String>,
    pub logged_onto: Option<String>,
    pub is_cleared: Option<bool>,
    pub current_message: Option<String>,
}

impl FlightUpdate {
    /// Carry over everything a flight-data record provides. A valid record
    /// with a route counts as a clearance.
    #[must_use]
    pub fn from_record(record: &FlightRecord) -> Self {
        Self {
            destination: record.destination.clone(),
            route_raw: record.route.clone(),
            track: record.track.clone(),
            assigned_level: record.assigned_level.clone(),
            assigned_mach: record.assigned_mach.clone(),
            logged_onto: record.logged_onto.clone(),
            is_cleared: (record.is_valid && record.route.is_some()).then_some(true),
            current_message: None,
        }
    }

    /// Whether applying this update changes the clearance a route is
    /// resolved from.
    #[must_use]
    pub fn touches_route(&self) -> bool {
        self.route_raw.is_some() || self.track.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn apply(&self, plan: &mut FlightPlan) {
        if let Some(destination) = self.destination.as_deref().and_then(non_empty) {
            plan.destination = destination;
        }
        if let Some(route_raw) = &self.route_raw {
            plan.route_raw.clone_from(route_raw);
        }
        if let Some(track) = self.track.as_deref().and_then(non_empty) {
            plan.track = track;
        }
        if self.assigned_level.is_some() {
            plan.assigned_level.clone_from(&self.assigned_level);
        }
        if self.assigned_mach.is_some() {
            plan.assigned_mach.clone_from(&self.assigned_mach);
        }
        if self.logged_onto.is_some() {
            plan.logged_onto.clone_from(&self.logged_onto);
        }
        if let Some(cleared) = self.is_cleared {
            plan.is_cleared = cleared;
        }
        if self.current_message.is_some() {
            plan.current_message.clone_from(&self.current_message);
        }
        plan.refresh_validity();
    }
}
