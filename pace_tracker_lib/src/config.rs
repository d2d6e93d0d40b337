use std::time::Duration;

use crate::{arrival::ArrivalZone, refresh::RefreshPolicy};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Countdown tick period.
    pub tick_period: Duration,
    pub refresh_policy: RefreshPolicy,
    pub position_timeout: Duration,
    pub route_timeout: Duration,
    /// Upper bound for the position + route reading taken while starting a trip.
    pub initial_timeout: Duration,
    pub arrival_zone: ArrivalZone,
    /// Updates a lagging subscriber may fall behind before it starts losing them.
    pub update_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            refresh_policy: RefreshPolicy::default(),
            position_timeout: Duration::from_secs(15),
            route_timeout: Duration::from_secs(15),
            initial_timeout: Duration::from_secs(10),
            arrival_zone: ArrivalZone::Local,
            update_capacity: 256,
        }
    }
}
