use std::{fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Source of the current wall-clock instant.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that advances with the tokio timer instead of the host clock.
///
/// Under a paused test runtime it moves exactly as far as the timers do.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or(chrono::Duration::zero());
        self.anchor + elapsed
    }
}

/// Seconds from `now` until `target`, clamped at zero.
pub fn remaining_seconds(target: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = target.signed_duration_since(now).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

/// Ticks towards an arrival target and fires once when it is reached.
///
/// Remaining time is always derived from the absolute target, so a host that
/// sleeps through several ticks reports the right value on the next one.
#[derive(Debug)]
pub struct CountdownClock {
    period: Duration,
    token: Option<CancellationToken>,
}

impl CountdownClock {
    pub fn new(period: Duration) -> Self {
        Self { period, token: None }
    }

    /// Spawns the tick task. A running countdown is stopped first.
    ///
    /// `on_tick` receives every remaining-time reading, the final zero
    /// included. `on_expire` runs once after that final tick, unless the
    /// countdown was stopped first.
    pub fn start<T, E>(
        &mut self,
        target: DateTime<Utc>,
        clock: Arc<dyn Clock>,
        parent: &CancellationToken,
        mut on_tick: T,
        on_expire: E,
    ) where
        T: FnMut(f64) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.stop();

        let token = parent.child_token();
        self.token = Some(token.clone());
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Countdown cancelled");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let remaining = remaining_seconds(target, clock.now());
                on_tick(remaining);

                if remaining <= 0.0 {
                    token.cancel();
                    debug!("Countdown reached arrival target");
                    on_expire();
                    return;
                }
            }
        });
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
