use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    clock::{remaining_seconds, Clock},
    coordinate::Coordinate,
    position::PositionSampler,
    refresh::RefreshPolicy,
    route::{RouteResolver, RouteResult},
    speed::required_speed_kmh,
};

/// Receives the results of refresh cycles.
///
/// Every method returns whether the trip the cycle belongs to is still live.
/// Once one returns false the scheduler drops the rest of the cycle and quits.
pub trait CycleSink: Send + Sync + 'static {
    fn position_sampled(&self, position: Coordinate) -> bool;

    fn route_resolved(&self, route: &RouteResult, required_speed_kmh: f64) -> bool;

    fn next_cycle_in(&self, interval: Duration) -> bool;
}

/// One sample → resolve → recompute unit of work for a fixed trip.
#[derive(Clone)]
pub struct RefreshCycle {
    sampler: PositionSampler,
    resolver: RouteResolver,
    destination: Coordinate,
    target: DateTime<Utc>,
    clock: Arc<dyn Clock>,
}

impl RefreshCycle {
    pub fn new(
        sampler: PositionSampler,
        resolver: RouteResolver,
        destination: Coordinate,
        target: DateTime<Utc>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sampler,
            resolver,
            destination,
            target,
            clock,
        }
    }

    pub fn remaining_seconds(&self) -> f64 {
        remaining_seconds(self.target, self.clock.now())
    }

    /// Runs one cycle to completion. Returns false if the sink reported the
    /// trip as over.
    ///
    /// A failed position sample skips routing entirely. An unresolved route
    /// publishes nothing, so the previous distance and speed are held.
    pub async fn run<S: CycleSink + ?Sized>(&self, sink: &S) -> bool {
        let remaining = self.remaining_seconds();

        let Ok(position) = self.sampler.sample().await else {
            debug!("Skipping routing for this cycle");
            return true;
        };

        if !sink.position_sampled(position) {
            return false;
        }

        match self.resolver.resolve(position, self.destination).await.into_resolved() {
            Ok(route) => {
                let speed = required_speed_kmh(route.distance_km, remaining);
                sink.route_resolved(&route, speed)
            }
            Err(unresolved) => {
                warn!("{}, holding previous distance and speed", unresolved);
                true
            }
        }
    }
}

/// Owns the self-rescheduling chain of refresh cycles for one trip.
///
/// The chain is a single loop, so at most one cycle is in flight and at most
/// one next cycle is armed at any time.
#[derive(Debug)]
pub struct AdaptiveScheduler {
    policy: RefreshPolicy,
    token: Option<CancellationToken>,
}

impl AdaptiveScheduler {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self { policy, token: None }
    }

    /// Runs the first cycle right away. A running chain is stopped first.
    pub fn start<S: CycleSink>(&mut self, cycle: RefreshCycle, parent: &CancellationToken, sink: S) {
        self.stop();

        let token = parent.child_token();
        self.token = Some(token.clone());
        let policy = self.policy.clone();

        tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }

                // Not raced against the token: an in-flight cycle finishes and
                // the sink discards whatever it produces after a stop.
                if !cycle.run(&sink).await || token.is_cancelled() {
                    break;
                }

                // Measured after the cycle so a slow cycle still tightens the cadence.
                let remaining = cycle.remaining_seconds();
                let interval = policy.next_interval(remaining);
                if !sink.next_cycle_in(interval) {
                    break;
                }
                debug!("Next refresh in {:?} ({:.0} s remaining)", interval, remaining);

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Refresh cycles stopped");
        });
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
