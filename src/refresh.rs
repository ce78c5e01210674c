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

//! Per-tick refresh.
//!
//! Once per tick the driver walks the host's radar targets, makes sure every
//! aircraft within the entry window has a registry record, sorts them into
//! the inbound and other lists and prunes records for aircraft the host no
//! longer reports.

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;

use crate::flight_plan::{normalize_callsign, FlightPlan};
use crate::host::{HostFeed, RadarTarget};
use crate::registry::FlightRegistry;

lazy_static! {
    /// Oceanic entry points on the eastern boundary, used by westbounds.
    static ref SHANWICK_ENTRY_POINTS: HashSet<&'static str> = [
        "RATSU", "LIMRI", "AMLAD", "MIMKU", "DINIM", "SIVIR", "TOBOR", "RIVAK",
        "ORTAV", "NIBOG", "DOGAL", "BEXET", "NEBIN", "GOMUP", "BILTO", "PIKIL",
        "ETARI", "RESNO", "VENER", "NETKI", "MALOT", "ADODO", "ERAKA", "ETILO", "GISTI", "SOMAX", "KOGAD", "BEDRA", "OMOKO",
        "GUNPA", "SUNOT", "BUNAV", "SEPAL", "BALIX",
    ]
    .into_iter()
    .collect();

    /// Oceanic entry points on the western boundary, used by eastbounds.
    static ref GANDER_ENTRY_POINTS: HashSet<&'static str> = [
        "AVPUT", "CLAVY", "EMBOK", "KETLA", "LIBOR", "MAXAR", "NIFTY", "PIDSO",
        "RADUN", "SAVRY", "TOXIT", "URTAK", "VESMI", "AVUTI", "BOKTO", "CUDDY",
        "DORYY", "ENNSO", "HOIST", "IRLOK", "JANJO", "KODIK", "LOMSI", "MELDI",
        "NEEKO", "PELTU", "RIKAL", "SAXAN", "TUDEP", "UMESI", "ALLRY", "ELSIR",
        "JOOPY", "MUSAK", "NICSO", "OMSAT", "PORTI", "RELIC", "SUPRY", "RAFIN",
    ]
    .into_iter()
    .collect();
}

/// Direction of flight derived from the reported heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Westbound,
    Eastbound,
}

impl FlowDirection {
    /// Headings 181 to 359 fly west, 1 to 179 east. Due north and south have
    /// no direction.
    #[must_use]
    pub fn from_heading(heading: i32) -> Option<Self> {
        match heading {
            181..=359 => Some(Self::Westbound),
            1..=179 => Some(Self::Eastbound),
            _ => None,
        }
    }

    fn entry_points(self) -> &'static HashSet<&'static str> {
        match self {
            Self::Westbound => &*SHANWICK_ENTRY_POINTS,
            Self::Eastbound => &*GANDER_ENTRY_POINTS,
        }
    }
}

/// An aircraft approaching oceanic entry.
#[derive(Debug, Clone)]
pub struct InboundAircraft {
    pub plan: Arc<FlightPlan>,
    pub direction: FlowDirection,
    pub entry_point: String,
    pub entry_minutes: i32,
}

/// The lists produced by one tick.
#[derive(Debug, Clone, Default)]
pub struct TickSnapshot {
    pub inbound: Vec<InboundAircraft>,
    pub other: Vec<Arc<FlightPlan>>,
    /// Callsigns that got a registry record this tick.
    pub new_callsigns: Vec<String>,
    pub removed_callsigns: Vec<String>,
}

#[derive(Debug)]
pub struct RefreshDriver {
    registry: Arc<FlightRegistry>,
    window_minutes: i32,
}

impl RefreshDriver {
    #[must_use]
    pub fn new(registry: Arc<FlightRegistry>, window_minutes: i32) -> Self {
        Self {
            registry,
            window_minutes,
        }
    }

    /// Records are created for targets inside the entry window and kept for
    /// as long as the host still reports the target, in the sector or not.
    pub fn tick(&self, host: &dyn HostFeed) -> TickSnapshot {
        let mut snapshot = TickSnapshot::default();
        let mut on_radar = HashSet::new();

        for target in host.radar_targets() {
            let callsign = normalize_callsign(&target.callsign);
            on_radar.insert(callsign.clone());
            if !(0..=self.window_minutes).contains(&target.sector_entry_minutes) {
                continue;
            }

            let plan = match self.registry.read(&callsign) {
                Some(plan) => plan,
                None => {
                    let Some(source) = host.flight_plan(&callsign) else {
                        debug!("No flight plan for radar target {callsign}");
                        continue;
                    };
                    snapshot.new_callsigns.push(callsign.clone());
                    self.registry.create(&source)
                }
            };

            match Self::classify(&target, &plan, host) {
                Some(inbound) => snapshot.inbound.push(inbound),
                None => snapshot.other.push(plan),
            }
        }

        snapshot.removed_callsigns = self.registry.retain(|cs| on_radar.contains(cs));
        snapshot
    }

    fn classify(
        target: &RadarTarget,
        plan: &Arc<FlightPlan>,
        host: &dyn HostFeed,
    ) -> Option<InboundAircraft> {
        if target.sector_entry_minutes <= 0 {
            return None;
        }
        let direction = FlowDirection::from_heading(target.heading)?;
        let entry_points = direction.entry_points();

        // Prefer the host's extracted route, fall back to the resolved one
        let host_points = host
            .flight_plan(&plan.callsign)
            .map(|source| source.route_points)
            .unwrap_or_default();
        let entry_point = host_points
            .iter()
            .chain(plan.route.iter())
            .map(|w| w.name.to_ascii_uppercase())
            .find(|name| entry_points.contains(name.as_str()))?;

        Some(InboundAircraft {
            plan: Arc::clone(plan),
            direction,
            entry_point,
            entry_minutes: target.sector_entry_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_plan::HostFlightPlan;
    use crate::registry::RouteScheduler;
    use crate::routes::RouteRequest;
    use natrak_client::{Coordinate, Waypoint};
    use std::collections::HashMap;

    struct NoRoutes;

    impl RouteScheduler for NoRoutes {
        fn schedule_route(&self, _request: RouteRequest) {}
    }

    #[derive(Default)]
    struct FakeHost {
        targets: Vec<RadarTarget>,
        plans: HashMap<String, HostFlightPlan>,
    }

    impl FakeHost {
        fn with(mut self, callsign: &str, heading: i32, entry: i32, points: &[&str]) -> Self {
            self.targets.push(RadarTarget {
                callsign: callsign.to_string(),
                heading,
                sector_entry_minutes: entry,
            });
            self.plans.insert(
                callsign.to_string(),
                HostFlightPlan {
                    callsign: callsign.to_string(),
                    route_points: points
                        .iter()
                        .map(|n| Waypoint::new(*n, Coordinate::new(55.0, -15.0)))
                        .collect(),
                    ..Default::default()
                },
            );
            self
        }
    }

    impl HostFeed for FakeHost {
        fn radar_targets(&self) -> Vec<RadarTarget> {
            self.targets.clone()
        }

        fn flight_plan(&self, callsign: &str) -> Option<HostFlightPlan> {
            self.plans.get(callsign).cloned()
        }
    }

    fn driver() -> (RefreshDriver, Arc<FlightRegistry>) {
        let registry = Arc::new(FlightRegistry::new(Arc::new(NoRoutes)));
        (RefreshDriver::new(registry.clone(), 90), registry)
    }

    fn inbound_callsigns(snapshot: &TickSnapshot) -> Vec<&str> {
        snapshot.inbound.iter().map(|a| a.plan.callsign.as_str()).collect()
    }

    #[test]
    fn test_classifies_by_heading_and_entry_point() {
        let (driver, _) = driver();
        let host = FakeHost::default()
            .with("WEST1", 270, 20, &["BURAK", "GISTI", "5720N"])
            .with("EAST1", 70, 15, &["JOOPY", "4950N"])
            .with("WRONG", 70, 15, &["GISTI"])
            .with("NORTH", 0, 15, &["GISTI"]);

        let snapshot = driver.tick(&host);

        assert_eq!(inbound_callsigns(&snapshot), vec!["WEST1", "EAST1"]);
        assert_eq!(snapshot.inbound[0].direction, FlowDirection::Westbound);
        assert_eq!(snapshot.inbound[0].entry_point, "GISTI");
        assert_eq!(snapshot.inbound[1].direction, FlowDirection::Eastbound);
        assert_eq!(snapshot.other.len(), 2);
        assert_eq!(snapshot.new_callsigns.len(), 4);
    }

    #[test]
    fn test_aircraft_at_entry_is_not_inbound() {
        let (driver, registry) = driver();
        let host = FakeHost::default().with("AT0", 270, 0, &["GISTI"]);

        let snapshot = driver.tick(&host);
        assert!(snapshot.inbound.is_empty());
        assert_eq!(snapshot.other.len(), 1);
        assert!(registry.contains("AT0"));
    }

    #[test]
    fn test_out_of_window_targets_are_not_created() {
        let (driver, registry) = driver();
        let host = FakeHost::default()
            .with("FAR1", 270, 120, &["GISTI"])
            .with("INSIDE1", 270, -5, &["GISTI"]);

        let snapshot = driver.tick(&host);
        assert!(snapshot.new_callsigns.is_empty());
        assert!(snapshot.other.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_record_survives_sector_entry() {
        let (driver, registry) = driver();
        driver.tick(&FakeHost::default().with("EIN1", 270, 5, &["GISTI"]));
        assert!(registry.contains("EIN1"));

        let snapshot = driver.tick(&FakeHost::default().with("EIN1", 270, -3, &["GISTI"]));
        assert!(snapshot.removed_callsigns.is_empty());
        assert!(snapshot.inbound.is_empty());
        assert!(registry.contains("EIN1"));
    }

    #[test]
    fn test_targets_gone_from_radar_are_pruned() {
        let (driver, registry) = driver();
        let host = FakeHost::default()
            .with("GONE1", 270, 30, &["GISTI"])
            .with("STAY1", 270, 40, &["GISTI"]);
        driver.tick(&host);

        let snapshot = driver.tick(&FakeHost::default().with("STAY1", 270, 39, &["GISTI"]));
        assert_eq!(snapshot.removed_callsigns, vec!["GONE1".to_string()]);
        assert!(!registry.contains("GONE1"));
        assert!(registry.contains("STAY1"));
        assert!(snapshot.new_callsigns.is_empty());
    }

    #[test]
    fn test_existing_records_are_reused() {
        let (driver, _) = driver();
        let host = FakeHost::default().with("KEEP1", 100, 45, &["LOMSI"]);

        let first = driver.tick(&host);
        let second = driver.tick(&host);
        assert_eq!(first.new_callsigns, vec!["KEEP1".to_string()]);
        assert!(second.new_callsigns.is_empty());
        assert_eq!(inbound_callsigns(&second), vec!["KEEP1"]);
    }

    #[test]
    fn test_flow_direction_from_heading() {
        assert_eq!(FlowDirection::from_heading(181), Some(FlowDirection::Westbound));
        assert_eq!(FlowDirection::from_heading(359), Some(FlowDirection::Westbound));
        assert_eq!(FlowDirection::from_heading(1), Some(FlowDirection::Eastbound));
        assert_eq!(FlowDirection::from_heading(180), None);
        assert_eq!(FlowDirection::from_heading(0), None);
    }
}
