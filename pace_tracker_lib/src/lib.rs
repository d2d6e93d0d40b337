//! Trip tracking engine: tells a driver the average speed needed to reach a
//! destination by a chosen arrival time, and keeps that advice fresh.

pub mod arrival;
pub mod clock;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod geocoding;
pub mod position;
pub mod refresh;
pub mod route;
pub mod scheduler;
pub mod session;
pub mod speed;
pub mod update;

pub use arrival::{ArrivalSpec, ArrivalZone, Meridiem};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::EngineConfig;
pub use coordinate::{Coordinate, Place};
pub use error::TripError;
pub use geocoding::{Geocoder, GeocodingError, GeocodingProvider};
pub use position::{PositionError, PositionProvider};
pub use route::{RouteResult, RoutingError, RoutingProvider};
pub use session::{Destination, TripSession, TripSnapshot};
pub use update::{TripStatus, TripUpdate, UpdateKind};
