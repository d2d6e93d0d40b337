#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use pace_tracker_lib::{
    ArrivalZone, Clock, Coordinate, EngineConfig, GeocodingError, GeocodingProvider, Place, PositionError,
    PositionProvider, RouteResult, RoutingError, RoutingProvider, TokioClock, TripSession, TripUpdate, UpdateKind,
};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub const ORIGIN: Coordinate = Coordinate {
    latitude: 34.0,
    longitude: -118.0,
};
pub const DESTINATION: Coordinate = Coordinate {
    latitude: 34.1,
    longitude: -118.0,
};

/// 2026-10-19 10:00:00 UTC, the instant every test trip starts at.
pub fn anchor() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-19T10:00:00Z").unwrap().with_timezone(&Utc)
}

pub struct ScriptedPosition {
    pub fix: Mutex<Result<Coordinate, PositionError>>,
    pub calls: AtomicUsize,
}

impl ScriptedPosition {
    pub fn at(position: Coordinate) -> Arc<Self> {
        Arc::new(Self {
            fix: Mutex::new(Ok(position)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_with(&self, err: PositionError) {
        *self.fix.lock().unwrap() = Err(err);
    }
}

#[async_trait]
impl PositionProvider for ScriptedPosition {
    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fix.lock().unwrap().clone()
    }
}

/// Answers every request with a fixed distance, or fails when it has none.
pub struct ScriptedRouter {
    pub distance_km: Mutex<Option<f64>>,
    pub delay: Mutex<Duration>,
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedRouter {
    pub fn with_distance(distance_km: f64) -> Arc<Self> {
        Arc::new(Self {
            distance_km: Mutex::new(Some(distance_km)),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        let router = Self::with_distance(0.0);
        *router.distance_km.lock().unwrap() = None;
        router
    }

    pub fn set_distance(&self, distance_km: Option<f64>) {
        *self.distance_km.lock().unwrap() = distance_km;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Most requests that were ever waiting on this router at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingProvider for ScriptedRouter {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        let distance = *self.distance_km.lock().unwrap();
        match distance {
            Some(distance_km) => Ok(RouteResult::new(distance_km, vec![origin, destination])),
            None => Err(RoutingError::NoRoute),
        }
    }
}

pub struct Gazetteer {
    pub places: Vec<Place>,
    pub delay: Duration,
}

impl Gazetteer {
    pub fn with(places: Vec<Place>) -> Arc<Self> {
        Arc::new(Self {
            places,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(places: Vec<Place>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { places, delay })
    }
}

#[async_trait]
impl GeocodingProvider for Gazetteer {
    async fn search(&self, text: &str) -> Result<Vec<Place>, GeocodingError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self
            .places
            .iter()
            .filter(|place| place.name.to_lowercase().contains(&text.to_lowercase()))
            .cloned()
            .collect())
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError> {
        Err(GeocodingError::Network(format!("no reverse lookup for {coordinate}")))
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        arrival_zone: ArrivalZone::Fixed(FixedOffset::east_opt(0).unwrap()),
        ..EngineConfig::default()
    }
}

/// Follows the paused runtime, plus any time the host was asleep for.
/// Jumps move the wall clock without firing a single timer.
#[derive(Debug)]
pub struct JumpClock {
    runtime: TokioClock,
    slept_secs: AtomicI64,
}

impl JumpClock {
    pub fn starting_at(anchor: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            runtime: TokioClock::starting_at(anchor),
            slept_secs: AtomicI64::new(0),
        })
    }

    pub fn jump(&self, secs: i64) {
        self.slept_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for JumpClock {
    fn now(&self) -> DateTime<Utc> {
        self.runtime.now() + chrono::Duration::seconds(self.slept_secs.load(Ordering::SeqCst))
    }
}

pub fn session(
    position: Arc<ScriptedPosition>,
    router: Arc<ScriptedRouter>,
    geocoder: Arc<Gazetteer>,
) -> TripSession {
    session_with_clock(position, router, geocoder, Arc::new(TokioClock::starting_at(anchor())))
}

pub fn session_with_clock(
    position: Arc<ScriptedPosition>,
    router: Arc<ScriptedRouter>,
    geocoder: Arc<Gazetteer>,
    clock: Arc<dyn Clock>,
) -> TripSession {
    TripSession::with_clock(position, router, geocoder, config(), clock)
}

/// Lets spawned tasks run without moving the paused clock noticeably.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn drain(rx: &mut broadcast::Receiver<TripUpdate>) -> Vec<TripUpdate> {
    let mut updates = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(update) => updates.push(update),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return updates,
        }
    }
}

pub fn kinds(updates: &[TripUpdate]) -> Vec<UpdateKind> {
    updates.iter().map(|update| update.kind.clone()).collect()
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
