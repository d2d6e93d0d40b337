use thiserror::Error;

/// Errors that keep a trip from starting.
///
/// Failures during an active trip (position or route unavailable) are never
/// returned to the caller. They are logged and the trip keeps its previous
/// readings until the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TripError {
    #[error("no destination found for {0:?}")]
    DestinationNotFound(String),

    #[error("invalid arrival time: {0}")]
    InvalidArrivalSpec(String),

    #[error("trip start was cancelled before the trip became active")]
    Cancelled,
}

/// A refresh cycle could not sample a position. The cycle skips routing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("position unavailable: {0}")]
pub struct PositionUnavailable(pub String);

/// A refresh cycle could not resolve a route. Distance and speed are held.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route unresolved: {0}")]
pub struct RouteUnresolved(pub String);
