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

//! Data service.
//!
//! [`DataService`] owns the worker pool, the track store, the fix database
//! and the flight registry for the lifetime of the overlay. The refresh
//! thread calls into it without ever waiting on the network: fetches and
//! route resolution run on the pool and write their results back through
//! completion callbacks.

use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use natrak_client::{
    FetchError, FlightDataClient, FlightDataSource, FlightRecord, Track, TrackFeedClient,
    TrackSource,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::flight_plan::{normalize_callsign, FlightUpdate};
use crate::notify::{Notification, Notifier};
use crate::registry::{FlightRegistry, RouteScheduler};
use crate::routes::{FixDatabase, ResolveError, ResolvedRoute, RouteRequest, RouteResolver};
use crate::tracks::{TrackSet, TrackStore};
use crate::worker::WorkerPool;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to start worker pool: {0}")]
    Runtime(#[from] io::Error),

    #[error("failed to create feed client: {0}")]
    Client(#[from] FetchError),
}

/// Sizing for a [`DataService`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub worker_threads: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs route resolution on the pool and writes results back.
struct RouteDispatcher {
    registry: Weak<FlightRegistry>,
    resolver: RouteResolver,
    fixes: Arc<FixDatabase>,
    pool: Arc<WorkerPool>,
}

impl RouteScheduler for RouteDispatcher {
    fn schedule_route(&self, request: RouteRequest) {
        self.fixes.insert_missing(&request.hints);

        let resolver = self.resolver.clone();
        let registry = self.registry.clone();
        self.pool.spawn_blocking(
            move || {
                let result = resolver.resolve(&request);
                (request, result)
            },
            move |(request, result)| {
                apply_resolution(&registry, &request.callsign, request.generation, result);
            },
        );
    }
}

fn apply_resolution(
    registry: &Weak<FlightRegistry>,
    callsign: &str,
    generation: u64,
    result: Result<ResolvedRoute, ResolveError>,
) {
    let resolved = match result {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!("Route for {callsign} not resolved: {e}");
            return;
        }
    };
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let points = resolved.route.len();
    match registry.apply_route(callsign, generation, resolved.route, resolved.track.as_deref()) {
        Ok(true) => debug!("Route for {callsign} set ({points} points)"),
        Ok(false) => debug!("Dropping stale route result for {callsign}"),
        Err(e) => debug!("Dropping route result: {e}"),
    }
}

/// Applies track fetches to the shared state.
#[derive(Clone)]
struct TrackUpdater {
    tracks: Arc<TrackStore>,
    fixes: Arc<FixDatabase>,
    registry: Weak<FlightRegistry>,
    notifier: Notifier,
}

impl TrackUpdater {
    /// Apply a track fetch and report the outcome. Exactly one notification
    /// is sent per call. A new publication re-resolves every track
    /// clearance in the registry.
    fn store(&self, result: Result<Vec<Track>, FetchError>) -> Option<Arc<TrackSet>> {
        match result {
            Ok(fetched) => {
                let set = self.tracks.replace(fetched);
                self.fixes.seed_from_tracks(&set);
                self.notifier.info(format!(
                    "Track data loaded successfully. TMI is {}.",
                    set.tmi().unwrap_or("unknown")
                ));
                if let Some(registry) = self.registry.upgrade() {
                    let queued = registry.requeue_track_routes();
                    if queued > 0 {
                        debug!("Re-resolving {queued} track clearances");
                    }
                }
                Some(set)
            }
            Err(FetchError::Parse(e)) => {
                self.notifier
                    .error(format!("Failed to parse NAT track data: {e}"));
                None
            }
            Err(e) => {
                self.notifier
                    .error(format!("Failed to load NAT Track data: {e}"));
                None
            }
        }
    }
}

pub struct DataService {
    pool: Arc<WorkerPool>,
    tracks: Arc<TrackStore>,
    fixes: Arc<FixDatabase>,
    registry: Arc<FlightRegistry>,
    notifier: Notifier,
    track_source: Arc<dyn TrackSource>,
    flight_source: Option<Arc<dyn FlightDataSource>>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for DataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataService")
            .field("registry", &self.registry)
            .field("fixes", &self.fixes.len())
            .field("flight_data", &self.flight_source.is_some())
            .finish_non_exhaustive()
    }
}

impl DataService {
    pub fn new(
        options: ServiceOptions,
        track_source: Arc<dyn TrackSource>,
        flight_source: Option<Arc<dyn FlightDataSource>>,
    ) -> io::Result<Self> {
        let pool = Arc::new(WorkerPool::new(options.worker_threads)?);
        let tracks = Arc::new(TrackStore::new());
        let fixes = Arc::new(FixDatabase::new());
        let resolver = RouteResolver::new(Arc::clone(&tracks), Arc::clone(&fixes));

        let registry = Arc::new_cyclic(|weak| {
            FlightRegistry::new(Arc::new(RouteDispatcher {
                registry: weak.clone(),
                resolver,
                fixes: Arc::clone(&fixes),
                pool: Arc::clone(&pool),
            }))
        });

        Ok(Self {
            pool,
            tracks,
            fixes,
            registry,
            notifier: Notifier::new(),
            track_source,
            flight_source,
            cancel: CancellationToken::new(),
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    /// Build a service talking to the feeds named in `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let track_source = Arc::new(TrackFeedClient::new(config.active_track_url())?);
        info!("Track feed: {}", track_source.url());

        let flight_source: Option<Arc<dyn FlightDataSource>> = match &config.api_base_url {
            Some(base) => {
                let client = FlightDataClient::new(base, config.resolve_api_key())?;
                info!("Flight-data API: {}", client.endpoint());
                Some(Arc::new(client))
            }
            None => {
                warn!("No flight-data API configured, flight sync disabled");
                None
            }
        };

        let options = ServiceOptions {
            worker_threads: config.worker_threads,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        };
        Ok(Self::new(options, track_source, flight_source)?)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<FlightRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn tracks(&self) -> &Arc<TrackStore> {
        &self.tracks
    }

    #[must_use]
    pub fn fixes(&self) -> &Arc<FixDatabase> {
        &self.fixes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    fn track_updater(&self) -> TrackUpdater {
        TrackUpdater {
            tracks: Arc::clone(&self.tracks),
            fixes: Arc::clone(&self.fixes),
            registry: Arc::downgrade(&self.registry),
            notifier: self.notifier.clone(),
        }
    }

    /// Fetch tracks in the background.
    pub fn populate_tracks(&self) {
        let source = Arc::clone(&self.track_source);
        let updater = self.track_updater();
        self.pool.spawn(async move { source.fetch_tracks().await }, move |result| {
            updater.store(result);
        });
    }

    /// Refetch tracks every `period` until shutdown. The first fetch happens
    /// after one period; pair with [`populate_tracks`](Self::populate_tracks)
    /// for an initial load.
    pub fn start_track_refresh(&self, period: Duration) {
        let source = Arc::clone(&self.track_source);
        let updater = self.track_updater();
        let cancel = self.cancel.clone();

        self.pool.spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            updater.store(source.fetch_tracks().await);
                        }
                    }
                }
            },
            |()| debug!("Track refresh stopped"),
        );
    }

    /// Fetch tracks on the pool and wait for the result.
    pub fn load_tracks_now(&self) -> Option<Arc<TrackSet>> {
        let result = self.pool.block_on(self.track_source.fetch_tracks());
        self.track_updater().store(result)
    }

    /// Pull clearance data for `callsign` in the background and merge it into
    /// the registry. A clearance that changes the route is resolved again.
    pub fn sync_flight(&self, callsign: &str) {
        let Some(source) = self.flight_source.clone() else {
            return;
        };
        let callsign = normalize_callsign(callsign);
        let registry = Arc::clone(&self.registry);
        let query = callsign.clone();

        self.pool.spawn(
            async move { source.fetch_or_invalid(&query).await },
            move |record| {
                if !record.is_valid {
                    return;
                }
                let update = FlightUpdate::from_record(&record);
                let refresh_route = update.route_raw.is_some() || record.is_track_route();
                if let Err(e) = registry.update(&callsign, &update, refresh_route) {
                    debug!("Dropping flight data: {e}");
                }
            },
        );
    }

    /// Fetch clearance data on the pool and wait for it. `None` when no
    /// flight-data API is configured.
    pub fn fetch_flight_now(&self, callsign: &str) -> Option<FlightRecord> {
        let source = self.flight_source.as_ref()?;
        let callsign = normalize_callsign(callsign);
        Some(self.pool.block_on(source.fetch_or_invalid(&callsign)))
    }

    /// Stop periodic work and drain the pool.
    pub fn shutdown(&self) {
        info!(
            "Shutting down data service ({} jobs pending)",
            self.pool.pending()
        );
        self.cancel.cancel();
        self.pool.shutdown(self.shutdown_timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_plan::HostFlightPlan;
    use crate::notify::NotificationLevel;
    use async_trait::async_trait;
    use natrak_client::{Coordinate, ParseError, TrackDirection, Waypoint};
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Instant;

    struct ScriptedTracks {
        responses: Mutex<VecDeque<Result<Vec<Track>, FetchError>>>,
    }

    impl ScriptedTracks {
        fn new(responses: Vec<Result<Vec<Track>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl TrackSource for ScriptedTracks {
        async fn fetch_tracks(&self) -> Result<Vec<Track>, FetchError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Status(503)))
        }
    }

    struct FixedFlightData(FlightRecord);

    #[async_trait]
    impl FlightDataSource for FixedFlightData {
        async fn fetch_flight_data(&self, _callsign: &str) -> Result<FlightRecord, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn track(id: &str, tmi: &str) -> Track {
        Track {
            identifier: id.to_string(),
            tmi: tmi.to_string(),
            direction: TrackDirection::West,
            route: vec![
                Waypoint::new("GISTI", Coordinate::new(54.0, -15.0)),
                Waypoint::new("5420N", Coordinate::new(54.0, -20.0)),
            ],
            flight_levels: BTreeSet::from([350, 360]),
        }
    }

    fn host_plan(callsign: &str) -> HostFlightPlan {
        HostFlightPlan {
            callsign: callsign.to_string(),
            aircraft_type: "B789".to_string(),
            origin: "EGKK".to_string(),
            destination: "KMCO".to_string(),
            estimated_departure_time: "1005".to_string(),
            raw_route: "GISTI DCT 55/20".to_string(),
            ..Default::default()
        }
    }

    fn service(
        tracks: Arc<ScriptedTracks>,
        flight_data: Option<Arc<dyn FlightDataSource>>,
    ) -> DataService {
        DataService::new(ServiceOptions::default(), tracks, flight_data).unwrap()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn test_track_load_notifies_tmi() {
        let svc = service(ScriptedTracks::new(vec![Ok(vec![track("A", "283"), track("B", "284")])]), None);
        let mut rx = svc.subscribe();

        let set = svc.load_tracks_now().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(svc.tracks().current_tmi().as_deref(), Some("284"));
        assert!(svc.fixes().lookup("GISTI").is_some());

        let note = rx.try_recv().unwrap();
        assert_eq!(note.level, NotificationLevel::Info);
        assert_eq!(note.text, "Track data loaded successfully. TMI is 284.");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_parse_failure_keeps_tracks_and_notifies_once() {
        let svc = service(
            ScriptedTracks::new(vec![
                Ok(vec![track("A", "283")]),
                Err(FetchError::Parse(ParseError::MissingField("id"))),
            ]),
            None,
        );
        svc.load_tracks_now().unwrap();
        let before = svc.tracks().snapshot();
        let mut rx = svc.subscribe();

        assert!(svc.load_tracks_now().is_none());

        assert_eq!(*svc.tracks().snapshot(), *before);
        let note = rx.try_recv().unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert!(note.text.starts_with("Failed to parse NAT track data"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_network_failure_notifies_load_error() {
        let svc = service(ScriptedTracks::new(Vec::new()), None);
        let mut rx = svc.subscribe();

        svc.populate_tracks();
        let note = rx.blocking_recv().unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert!(note.text.starts_with("Failed to load NAT Track data"));
        assert!(svc.tracks().snapshot().is_empty());
        svc.shutdown();
    }

    #[test]
    fn test_created_flight_gets_resolved_route() {
        let svc = service(ScriptedTracks::new(Vec::new()), None);
        svc.registry().create(&host_plan("VIR21"));

        assert!(wait_for(|| {
            svc.registry()
                .read("VIR21")
                .is_some_and(|plan| plan.route.len() == 1)
        }));
        let plan = svc.registry().read("VIR21").unwrap();
        assert_eq!(plan.route[0].name, "55/20");
        assert_eq!(plan.track, "RR");
        svc.shutdown();
    }

    #[test]
    fn test_sync_flight_applies_track_clearance() {
        let record = FlightRecord {
            callsign: "VIR21".to_string(),
            track: Some("A".to_string()),
            assigned_level: Some("350".to_string()),
            assigned_mach: Some("084".to_string()),
            is_valid: true,
            ..Default::default()
        };
        let svc = service(
            ScriptedTracks::new(vec![Ok(vec![track("A", "284")])]),
            Some(Arc::new(FixedFlightData(record))),
        );
        svc.load_tracks_now().unwrap();
        svc.registry().create(&host_plan("VIR21"));
        assert!(wait_for(|| {
            svc.registry()
                .read("VIR21")
                .is_some_and(|plan| plan.route.len() == 2)
        }));

        svc.sync_flight("vir21");

        // Track A ends at 5420N, the filed route at 55/20
        assert!(wait_for(|| {
            svc.registry()
                .read("VIR21")
                .is_some_and(|plan| plan.route.last().is_some_and(|w| w.name == "5420N"))
        }));
        let plan = svc.registry().read("VIR21").unwrap();
        assert_eq!(plan.track, "A");
        assert_eq!(plan.assigned_level.as_deref(), Some("350"));
        assert_eq!(plan.assigned_mach.as_deref(), Some("084"));
        svc.shutdown();
    }

    #[test]
    fn test_track_clearance_resolves_once_tracks_arrive() {
        let svc = service(ScriptedTracks::new(vec![Ok(vec![track("A", "284")])]), None);
        let mut source = host_plan("ACA870");
        source.assigned_track = Some("A".to_string());
        svc.registry().create(&source);

        // No tracks yet, so the first resolution fails
        assert!(wait_for(|| svc.pool.pending() == 0));
        assert!(svc.registry().read("ACA870").unwrap().route.is_empty());

        svc.load_tracks_now().unwrap();

        assert!(wait_for(|| {
            svc.registry()
                .read("ACA870")
                .is_some_and(|plan| plan.route.len() == 2)
        }));
        let plan = svc.registry().read("ACA870").unwrap();
        assert_eq!(plan.track, "A");
        assert_eq!(plan.route[1].name, "5420N");
        svc.shutdown();
    }

    #[test]
    fn test_stale_resolution_keeps_newer_track() {
        let registry = Arc::new(FlightRegistry::new(Arc::new(NoRoutes)));
        let created = registry.create(&host_plan("VIR21"));
        let update = FlightUpdate {
            track: Some("A".to_string()),
            ..Default::default()
        };
        registry.update("VIR21", &update, true).unwrap();
        let weak = Arc::downgrade(&registry);

        let track_route = ResolvedRoute {
            route: track("A", "284").route,
            track: Some("A".to_string()),
        };
        apply_resolution(&weak, "VIR21", created.route_generation + 1, Ok(track_route));

        // The filed route finishes after the track clearance
        let filed_route = ResolvedRoute {
            route: vec![Waypoint::new("55/20", Coordinate::new(55.0, -20.0))],
            track: None,
        };
        apply_resolution(&weak, "VIR21", created.route_generation, Ok(filed_route));

        let plan = registry.read("VIR21").unwrap();
        assert_eq!(plan.track, "A");
        assert_eq!(plan.route.len(), 2);
        assert_eq!(plan.route[1].name, "5420N");
    }

    #[test]
    fn test_host_hints_do_not_override_known_fixes() {
        let svc = service(ScriptedTracks::new(vec![Ok(vec![track("A", "284")])]), None);
        svc.load_tracks_now().unwrap();

        let mut source = host_plan("DLH400");
        source.route_points = vec![
            Waypoint::new("GISTI", Coordinate::new(10.0, 10.0)),
            Waypoint::new("BURAK", Coordinate::new(53.0, -8.0)),
        ];
        svc.registry().create(&source);

        assert_eq!(svc.fixes().lookup("GISTI"), Some(Coordinate::new(54.0, -15.0)));
        assert_eq!(svc.fixes().lookup("BURAK"), Some(Coordinate::new(53.0, -8.0)));
        svc.shutdown();
    }

    #[test]
    fn test_resolution_for_deleted_flight_is_dropped() {
        let registry = Arc::new(FlightRegistry::new(Arc::new(NoRoutes)));
        registry.create(&host_plan("GONE1"));
        registry.delete("GONE1").unwrap();

        let resolved = ResolvedRoute {
            route: vec![Waypoint::new("GISTI", Coordinate::new(54.0, -15.0))],
            track: None,
        };
        apply_resolution(&Arc::downgrade(&registry), "GONE1", 1, Ok(resolved.clone()));
        assert!(registry.read("GONE1").is_none());

        // A registry that is already gone is also fine
        let weak = Arc::downgrade(&registry);
        drop(registry);
        apply_resolution(&weak, "GONE1", 1, Ok(resolved));
    }

    #[test]
    fn test_without_flight_data_api() {
        let svc = service(ScriptedTracks::new(Vec::new()), None);
        assert!(svc.fetch_flight_now("VIR21").is_none());
        svc.sync_flight("VIR21");
        svc.shutdown();
    }

    struct NoRoutes;

    impl RouteScheduler for NoRoutes {
        fn schedule_route(&self, _request: RouteRequest) {}
    }
}
