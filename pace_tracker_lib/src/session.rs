use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use geo_types::LineString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    arrival::ArrivalSpec,
    clock::{remaining_seconds, Clock, CountdownClock, SystemClock},
    config::EngineConfig,
    coordinate::{Coordinate, Place},
    error::TripError,
    geocoding::{Geocoder, GeocodingProvider},
    position::{PositionProvider, PositionSampler},
    route::{RouteResolver, RouteResult, RoutingProvider},
    scheduler::{AdaptiveScheduler, CycleSink, RefreshCycle},
    update::{TripStatus, TripUpdate, UpdateKind},
};

/// Where a trip should end.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Free text, resolved through the geocoder.
    Text(String),
    Coordinate(Coordinate),
    Place(Place),
}

impl From<&str> for Destination {
    fn from(value: &str) -> Self {
        Destination::Text(value.to_string())
    }
}

impl From<Coordinate> for Destination {
    fn from(value: Coordinate) -> Self {
        Destination::Coordinate(value)
    }
}

impl From<Place> for Destination {
    fn from(value: Place) -> Self {
        Destination::Place(value)
    }
}

/// Owned copy of a session's state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub status: TripStatus,
    pub destination: Option<Place>,
    pub target: Option<DateTime<Utc>>,
    pub current_position: Option<Coordinate>,
    pub last_distance_km: f64,
    pub required_speed_kmh: f64,
    /// Path of the last resolved route, as longitude/latitude points.
    pub route: Option<LineString>,
    pub remaining_seconds: f64,
    pub next_refresh_secs: Option<u64>,
}

impl TripSnapshot {
    fn idle() -> Self {
        Self {
            status: TripStatus::Idle,
            destination: None,
            target: None,
            current_position: None,
            last_distance_km: 0.0,
            required_speed_kmh: 0.0,
            route: None,
            remaining_seconds: 0.0,
            next_refresh_secs: None,
        }
    }
}

#[derive(Debug)]
struct TripData {
    destination: Place,
    target: DateTime<Utc>,
    current_position: Option<Coordinate>,
    last_distance_km: f64,
    required_speed_kmh: f64,
    route: Option<LineString>,
    remaining_seconds: f64,
    next_refresh: Option<Duration>,
}

impl TripData {
    fn snapshot(&self, status: TripStatus) -> TripSnapshot {
        TripSnapshot {
            status,
            destination: Some(self.destination.clone()),
            target: Some(self.target),
            current_position: self.current_position,
            last_distance_km: self.last_distance_km,
            required_speed_kmh: self.required_speed_kmh,
            route: self.route.clone(),
            remaining_seconds: self.remaining_seconds,
            next_refresh_secs: self.next_refresh.map(|interval| interval.as_secs()),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    status: TripStatus,
    /// Bumped by every start, so work from an older trip can recognise itself.
    generation: u64,
    trip: Option<TripData>,
    last_outcome: Option<TripStatus>,
    pending_start: Option<CancellationToken>,
    trip_token: Option<CancellationToken>,
    countdown: CountdownClock,
    scheduler: AdaptiveScheduler,
}

struct SessionShared {
    clock: Arc<dyn Clock>,
    updates: broadcast::Sender<TripUpdate>,
    state: Mutex<SessionState>,
}

/// Everything measured while a trip starts, before it becomes active.
struct Prepared {
    destination: Place,
    target: DateTime<Utc>,
    reading: InitialReading,
}

#[derive(Default)]
struct InitialReading {
    position: Mutex<Option<Coordinate>>,
    route: Mutex<Option<(RouteResult, f64)>>,
}

impl CycleSink for InitialReading {
    fn position_sampled(&self, position: Coordinate) -> bool {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = Some(position);
        true
    }

    fn route_resolved(&self, route: &RouteResult, required_speed_kmh: f64) -> bool {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) = Some((route.clone(), required_speed_kmh));
        true
    }

    fn next_cycle_in(&self, _: Duration) -> bool {
        true
    }
}

/// The trip tracking engine.
///
/// Cloning gives another handle to the same session. All state lives behind
/// one lock that is never held across an await.
#[derive(Clone)]
pub struct TripSession {
    shared: Arc<SessionShared>,
    geocoder: Geocoder,
    sampler: PositionSampler,
    resolver: RouteResolver,
    config: EngineConfig,
}

impl TripSession {
    pub fn new(
        position: Arc<dyn PositionProvider>,
        routing: Arc<dyn RoutingProvider>,
        geocoding: Arc<dyn GeocodingProvider>,
        config: EngineConfig,
    ) -> Self {
        Self::with_clock(position, routing, geocoding, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        position: Arc<dyn PositionProvider>,
        routing: Arc<dyn RoutingProvider>,
        geocoding: Arc<dyn GeocodingProvider>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));

        let state = SessionState {
            status: TripStatus::Idle,
            generation: 0,
            trip: None,
            last_outcome: None,
            pending_start: None,
            trip_token: None,
            countdown: CountdownClock::new(config.tick_period),
            scheduler: AdaptiveScheduler::new(config.refresh_policy.clone()),
        };

        Self {
            shared: Arc::new(SessionShared {
                clock,
                updates,
                state: Mutex::new(state),
            }),
            geocoder: Geocoder::new(geocoding),
            sampler: PositionSampler::new(position, config.position_timeout),
            resolver: RouteResolver::new(routing, config.route_timeout),
            config,
        }
    }

    pub fn geocoder(&self) -> &Geocoder {
        &self.geocoder
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn status(&self) -> TripStatus {
        self.shared.state().status
    }

    /// How the most recent trip ended, if one has.
    pub fn last_outcome(&self) -> Option<TripStatus> {
        self.shared.state().last_outcome
    }

    pub fn snapshot(&self) -> TripSnapshot {
        let state = self.shared.state();
        match &state.trip {
            Some(trip) => trip.snapshot(state.status),
            None => TripSnapshot::idle(),
        }
    }

    /// Starts tracking a trip to `destination`, arriving at `arrival`.
    ///
    /// An active trip is stopped first. The destination is geocoded if given
    /// as text, then one position + route reading is taken so the trip does
    /// not start blank. That reading is bounded by a timeout and its failure
    /// only leaves distance and speed at zero.
    pub async fn start(&self, destination: impl Into<Destination>, arrival: ArrivalSpec) -> Result<TripSnapshot, TripError> {
        let (generation, cancel) = self.shared.begin_start();

        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TripError::Cancelled),
            prepared = self.prepare(destination.into(), arrival) => prepared,
        };

        match prepared {
            Ok(prepared) => self.shared.activate(generation, prepared, self.cycle_parts()),
            Err(err) => {
                self.shared.abandon_start(generation);
                info!("Trip did not start: {}", err);
                Err(err)
            }
        }
    }

    /// Stops the active trip, or cancels one that is still starting.
    /// Calling it with nothing running does nothing.
    pub fn stop(&self) {
        self.shared.stop();
    }

    fn cycle_parts(&self) -> (PositionSampler, RouteResolver) {
        (self.sampler.clone(), self.resolver.clone())
    }

    async fn prepare(&self, destination: Destination, arrival: ArrivalSpec) -> Result<Prepared, TripError> {
        let destination = match destination {
            Destination::Text(text) => self.geocoder.locate(&text).await?,
            Destination::Coordinate(coordinate) => Place::new(coordinate.to_string(), coordinate),
            Destination::Place(place) => place,
        };

        let target = self.config.arrival_zone.resolve(&arrival, self.shared.clock.now())?;
        info!("Heading to {} ({}), arriving {}", destination.name, destination.coordinate, target);

        let cycle = RefreshCycle::new(
            self.sampler.clone(),
            self.resolver.clone(),
            destination.coordinate,
            target,
            self.shared.clock.clone(),
        );
        let reading = InitialReading::default();
        if tokio::time::timeout(self.config.initial_timeout, cycle.run(&reading)).await.is_err() {
            debug!("Initial reading timed out after {:?}", self.config.initial_timeout);
        }

        Ok(Prepared {
            destination,
            target,
            reading,
        })
    }
}

impl SessionShared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, kind: UpdateKind) {
        // No subscribers is fine
        let _ = self.updates.send(TripUpdate::new(self.clock.now(), kind));
    }

    fn begin_start(&self) -> (u64, CancellationToken) {
        let mut state = self.state();

        if let Some(pending) = state.pending_start.take() {
            debug!("Superseding a trip that was still starting");
            pending.cancel();
        }
        if state.status == TripStatus::Active {
            info!("Superseding the active trip");
            self.finish(&mut state, TripStatus::Stopped);
        }

        state.generation += 1;
        let token = CancellationToken::new();
        state.pending_start = Some(token.clone());

        (state.generation, token)
    }

    fn abandon_start(&self, generation: u64) {
        let mut state = self.state();
        if state.generation == generation {
            state.pending_start = None;
        }
    }

    fn activate(
        self: &Arc<Self>,
        generation: u64,
        prepared: Prepared,
        (sampler, resolver): (PositionSampler, RouteResolver),
    ) -> Result<TripSnapshot, TripError> {
        let mut state = self.state();

        let still_pending = state
            .pending_start
            .as_ref()
            .is_some_and(|token| !token.is_cancelled());
        if state.generation != generation || !still_pending {
            return Err(TripError::Cancelled);
        }
        state.pending_start = None;

        let Prepared {
            destination,
            target,
            reading,
        } = prepared;
        let position = *reading.position.lock().unwrap_or_else(PoisonError::into_inner);
        let route = reading.route.lock().unwrap_or_else(PoisonError::into_inner).take();
        let (distance, speed) = route
            .as_ref()
            .map_or((0.0, 0.0), |(route, speed)| (route.distance_km, *speed));
        let remaining = remaining_seconds(target, self.clock.now());

        state.trip = Some(TripData {
            destination: destination.clone(),
            target,
            current_position: position,
            last_distance_km: distance,
            required_speed_kmh: speed,
            route: route.as_ref().map(|(route, _)| route.line_string()),
            remaining_seconds: remaining,
            next_refresh: None,
        });
        state.status = TripStatus::Active;

        self.publish(UpdateKind::Status(TripStatus::Active));
        if let Some(position) = position {
            self.publish(UpdateKind::Position(position));
        }
        if route.is_some() {
            self.publish(UpdateKind::Distance(distance));
            self.publish(UpdateKind::Speed(speed));
        }
        self.publish(UpdateKind::RemainingTime(remaining));

        let trip_token = CancellationToken::new();
        let handle = TripHandle {
            shared: self.clone(),
            generation,
        };

        let tick_handle = handle.clone();
        let expire_handle = handle.clone();
        state.countdown.start(
            target,
            self.clock.clone(),
            &trip_token,
            move |remaining| tick_handle.remaining(remaining),
            move || expire_handle.expire(),
        );

        let cycle = RefreshCycle::new(sampler, resolver, destination.coordinate, target, self.clock.clone());
        state.scheduler.start(cycle, &trip_token, handle);
        state.trip_token = Some(trip_token);

        info!("Trip {} active, {:.0} s to go", generation, remaining);

        let snapshot = state
            .trip
            .as_ref()
            .map(|trip| trip.snapshot(TripStatus::Active))
            .unwrap_or_else(TripSnapshot::idle);
        Ok(snapshot)
    }

    fn stop(&self) {
        let mut state = self.state();

        if let Some(pending) = state.pending_start.take() {
            info!("Cancelling trip start");
            pending.cancel();
        }
        if state.status == TripStatus::Active {
            self.finish(&mut state, TripStatus::Stopped);
        }
    }

    /// The single exit path of an active trip, for stop and completion alike.
    fn finish(&self, state: &mut SessionState, outcome: TripStatus) {
        state.countdown.stop();
        state.scheduler.stop();
        if let Some(token) = state.trip_token.take() {
            token.cancel();
        }

        state.status = outcome;
        self.publish(UpdateKind::Status(outcome));
        info!("Trip {} ended: {:?}", state.generation, outcome);

        state.trip = None;
        state.last_outcome = Some(outcome);
        state.status = TripStatus::Idle;
        self.publish(UpdateKind::Status(TripStatus::Idle));
    }
}

/// A trip's view of the session, valid only while that trip is active.
#[derive(Clone)]
struct TripHandle {
    shared: Arc<SessionShared>,
    generation: u64,
}

impl TripHandle {
    fn with_trip(&self, apply: impl FnOnce(&mut TripData, &SessionShared)) -> bool {
        let mut state = self.shared.state();
        if state.generation != self.generation || state.status != TripStatus::Active {
            return false;
        }
        let Some(trip) = state.trip.as_mut() else {
            return false;
        };

        apply(trip, &self.shared);
        true
    }

    fn remaining(&self, remaining: f64) {
        self.with_trip(|trip, shared| {
            trip.remaining_seconds = remaining;
            shared.publish(UpdateKind::RemainingTime(remaining));
        });
    }

    fn expire(&self) {
        let mut state = self.shared.state();
        if state.generation == self.generation && state.status == TripStatus::Active {
            self.shared.finish(&mut state, TripStatus::Completed);
        }
    }
}

impl CycleSink for TripHandle {
    fn position_sampled(&self, position: Coordinate) -> bool {
        self.with_trip(|trip, shared| {
            trip.current_position = Some(position);
            shared.publish(UpdateKind::Position(position));
        })
    }

    fn route_resolved(&self, route: &RouteResult, required_speed_kmh: f64) -> bool {
        self.with_trip(|trip, shared| {
            trip.last_distance_km = route.distance_km;
            trip.required_speed_kmh = required_speed_kmh;
            trip.route = Some(route.line_string());
            shared.publish(UpdateKind::Distance(route.distance_km));
            shared.publish(UpdateKind::Speed(required_speed_kmh));
        })
    }

    fn next_cycle_in(&self, interval: Duration) -> bool {
        self.with_trip(|trip, shared| {
            trip.next_refresh = Some(interval);
            shared.publish(UpdateKind::NextRefresh(interval));
        })
    }
}
