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

//! Host simulator abstraction.
//!
//! The refresh driver reads radar targets and filed flight plans through
//! [`HostFeed`]. [`ReplayHost`] plays back recorded snapshots so the core can
//! run headless.

use std::collections::HashMap;
use std::path::Path;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::flight_plan::{normalize_callsign, HostFlightPlan};

/// One aircraft as the host's radar sees it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RadarTarget {
    pub callsign: String,
    /// Reported heading in whole degrees.
    pub heading: i32,
    /// Minutes until the aircraft enters our sector, negative once inside.
    pub sector_entry_minutes: i32,
}

/// Read access to the host simulator.
pub trait HostFeed {
    fn radar_targets(&self) -> Vec<RadarTarget>;

    fn flight_plan(&self, callsign: &str) -> Option<HostFlightPlan>;
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid replay file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("replay file has no frames")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct ReplayFile {
    #[serde(default)]
    flight_plans: Vec<HostFlightPlan>,
    frames: Vec<Vec<RadarTarget>>,
}

/// Plays back a recorded sequence of radar frames.
#[derive(Debug)]
pub struct ReplayHost {
    plans: HashMap<String, HostFlightPlan>,
    frames: Vec<Vec<RadarTarget>>,
    current: usize,
}

impl ReplayHost {
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let host = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(
            "Loaded replay {} ({} frames, {} flight plans)",
            path.display(),
            host.frames.len(),
            host.plans.len()
        );
        Ok(host)
    }

    pub fn from_json(json: &str) -> Result<Self, HostError> {
        let file: ReplayFile = serde_json::from_str(json)?;
        if file.frames.is_empty() {
            return Err(HostError::Empty);
        }
        let plans = file
            .flight_plans
            .into_iter()
            .map(|plan| (normalize_callsign(&plan.callsign), plan))
            .collect();
        Ok(Self {
            plans,
            frames: file.frames,
            current: 0,
        })
    }

    /// Move to the next frame. Returns false once the last frame is showing.
    pub fn advance(&mut self) -> bool {
        if self.current + 1 < self.frames.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl HostFeed for ReplayHost {
    fn radar_targets(&self) -> Vec<RadarTarget> {
        self.frames.get(self.current).cloned().unwrap_or_default()
    }

    fn flight_plan(&self, callsign: &str) -> Option<HostFlightPlan> {
        self.plans.get(&normalize_callsign(callsign)).cloned()
    }
}
