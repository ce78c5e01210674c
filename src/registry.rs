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

//! Flight registry.
//!
//! The registry owns every [`FlightPlan`] the overlay knows about, keyed by
//! normalized callsign. Records are stored as `Arc<FlightPlan>` and never
//! mutated in place: a write clones the record, changes the copy and swaps
//! it into the map under the write lock. A reader holding an `Arc` from an
//! earlier tick keeps a consistent (if stale) view.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};
use natrak_client::{Waypoint, RAW_ROUTE_TRACK};
use thiserror::Error;

use crate::flight_plan::{normalize_callsign, FlightPlan, FlightUpdate, HostFlightPlan};
use crate::routes::RouteRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("flight {0} is not in the registry")]
    NotFound(String),
}

/// Accepts route resolution work on behalf of the registry.
pub trait RouteScheduler: Send + Sync {
    fn schedule_route(&self, request: RouteRequest);
}

pub struct FlightRegistry {
    flights: RwLock<HashMap<String, Arc<FlightPlan>>>,
    scheduler: Arc<dyn RouteScheduler>,
}

impl fmt::Debug for FlightRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightRegistry")
            .field("flights", &self.len())
            .finish_non_exhaustive()
    }
}

impl FlightRegistry {
    pub fn new(scheduler: Arc<dyn RouteScheduler>) -> Self {
        Self {
            flights: RwLock::new(HashMap::new()),
            scheduler,
        }
    }

    /// Insert a record built from the host's flight plan, replacing any
    /// existing entry, and queue its route for resolution.
    pub fn create(&self, source: &HostFlightPlan) -> Arc<FlightPlan> {
        let mut plan = FlightPlan::from_host(source);
        let plan = {
            let mut flights = self.flights.write().unwrap_or_else(PoisonError::into_inner);
            plan.route_generation = flights
                .get(&plan.callsign)
                .map_or(0, |old| old.route_generation)
                + 1;
            let plan = Arc::new(plan);
            flights.insert(plan.callsign.clone(), Arc::clone(&plan));
            plan
        };
        debug!("Created flight {} (valid: {})", plan.callsign, plan.is_valid);

        self.scheduler
            .schedule_route(RouteRequest::for_plan(&plan, source.route_points.clone()));
        plan
    }

    #[must_use]
    pub fn read(&self, callsign: &str) -> Option<Arc<FlightPlan>> {
        self.flights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_callsign(callsign))
            .cloned()
    }

    /// Like [`read`](Self::read), with an invalid placeholder for unknown
    /// callsigns.
    #[must_use]
    pub fn read_or_invalid(&self, callsign: &str) -> Arc<FlightPlan> {
        self.read(callsign)
            .unwrap_or_else(|| Arc::new(FlightPlan::invalid(callsign)))
    }

    #[must_use]
    #[allow(dead_code, reason = "consumer API")]
    pub fn contains(&self, callsign: &str) -> bool {
        self.flights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize_callsign(callsign))
    }

    /// Merge `update` into an existing record. With `refresh_route` the
    /// record's clearance is queued for resolution again. An update that
    /// changes the clearance makes in-flight results for the old one stale.
    pub fn update(
        &self,
        callsign: &str,
        update: &FlightUpdate,
        refresh_route: bool,
    ) -> Result<(), RegistryError> {
        let updated = self.modify(callsign, |plan| {
            update.apply(plan);
            if refresh_route || update.touches_route() {
                plan.route_generation += 1;
            }
        })?;
        if refresh_route {
            self.scheduler
                .schedule_route(RouteRequest::for_plan(&updated, updated.route.clone()));
        }
        Ok(())
    }

    /// Replace a record's route. An absent or empty track label means a
    /// random route. Resolutions still in flight for the record are dropped
    /// when they complete.
    pub fn set_route(
        &self,
        callsign: &str,
        route: Vec<Waypoint>,
        track: Option<&str>,
    ) -> Result<(), RegistryError> {
        let label = route_label(track);
        self.modify(callsign, move |plan| {
            plan.route = route;
            plan.track = label;
            plan.route_generation += 1;
        })?;
        Ok(())
    }

    /// Write back a resolved route if the record's clearance has not changed
    /// since the request for `generation` was queued. Returns whether the
    /// route was stored.
    pub fn apply_route(
        &self,
        callsign: &str,
        generation: u64,
        route: Vec<Waypoint>,
        track: Option<&str>,
    ) -> Result<bool, RegistryError> {
        let key = normalize_callsign(callsign);
        let mut flights = self.flights.write().unwrap_or_else(PoisonError::into_inner);
        let entry = flights
            .get_mut(&key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        if entry.route_generation != generation {
            return Ok(false);
        }

        let mut copy = (**entry).clone();
        copy.route = route;
        copy.track = route_label(track);
        *entry = Arc::new(copy);
        Ok(true)
    }

    /// Queue every record cleared on a track for resolution again. Returns
    /// how many were queued.
    pub fn requeue_track_routes(&self) -> usize {
        let requests: Vec<RouteRequest> = {
            let mut flights = self.flights.write().unwrap_or_else(PoisonError::into_inner);
            flights
                .values_mut()
                .filter(|plan| plan.is_on_track())
                .map(|entry| {
                    let mut copy = (**entry).clone();
                    copy.route_generation += 1;
                    let request = RouteRequest::for_plan(&copy, Vec::new());
                    *entry = Arc::new(copy);
                    request
                })
                .collect()
        };

        let queued = requests.len();
        for request in requests {
            self.scheduler.schedule_route(request);
        }
        queued
    }

    #[allow(dead_code, reason = "consumer API, the refresh path prunes with retain")]
    pub fn delete(&self, callsign: &str) -> Result<(), RegistryError> {
        let key = normalize_callsign(callsign);
        match self
            .flights
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
        {
            Some(_) => {
                debug!("Deleted flight {key}");
                Ok(())
            }
            None => Err(RegistryError::NotFound(key)),
        }
    }

    /// Drop every record whose callsign fails `keep`. Returns the removed
    /// callsigns.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut removed = Vec::new();
        self.flights
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|callsign, _| {
                let kept = keep(callsign.as_str());
                if !kept {
                    removed.push(callsign.clone());
                }
                kept
            });
        if !removed.is_empty() {
            info!("Removed {} flights no longer on radar", removed.len());
        }
        removed
    }

    #[must_use]
    pub fn callsigns(&self) -> Vec<String> {
        self.flights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    #[allow(dead_code, reason = "pairs with len")]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn modify(
        &self,
        callsign: &str,
        change: impl FnOnce(&mut FlightPlan),
    ) -> Result<Arc<FlightPlan>, RegistryError> {
        let key = normalize_callsign(callsign);
        let mut flights = self.flights.write().unwrap_or_else(PoisonError::into_inner);
        let entry = flights
            .get_mut(&key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;

        let mut copy = (**entry).clone();
        change(&mut copy);
        *entry = Arc::new(copy);
        Ok(Arc::clone(entry))
    }
}

fn route_label(track: Option<&str>) -> String {
    track
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(RAW_ROUTE_TRACK)
        .to_string()
}
