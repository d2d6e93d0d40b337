use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatus {
    Idle,
    Active,
    Completed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateKind {
    Position(Coordinate),
    Distance(f64),
    Speed(f64),
    RemainingTime(f64),
    NextRefresh(Duration),
    Status(TripStatus),
}

/// One discrete, timestamped change published by a trip session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripUpdate {
    pub at: DateTime<Utc>,
    pub kind: UpdateKind,
}

impl TripUpdate {
    pub fn new(at: DateTime<Utc>, kind: UpdateKind) -> Self {
        Self { at, kind }
    }
}
