use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use geo_types::{LineString, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{coordinate::Coordinate, error::RouteUnresolved};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Network(String),
    #[error("malformed routing response: {0}")]
    Malformed(String),
    #[error("no route between the given points")]
    NoRoute,
}

/// Road distance and path between two points.
///
/// Zero distance or an empty path means the route is unknown, never that the
/// driver has arrived.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteResult {
    pub distance_km: f64,
    pub path: Vec<Coordinate>,
}

impl RouteResult {
    pub fn new(distance_km: f64, path: Vec<Coordinate>) -> Self {
        Self { distance_km, path }
    }

    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.distance_km.is_finite() && self.distance_km > 0.0 && !self.path.is_empty()
    }

    pub fn into_resolved(self) -> Result<Self, RouteUnresolved> {
        if self.is_resolved() {
            Ok(self)
        } else {
            Err(RouteUnresolved(format!(
                "{:.3} km over {} path points",
                self.distance_km,
                self.path.len()
            )))
        }
    }

    pub fn line_string(&self) -> LineString {
        self.path.iter().map(|&coordinate| Point::from(coordinate)).collect()
    }
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, RoutingError>;
}

/// Wraps a routing provider so that every failure becomes an unresolved route.
#[derive(Clone)]
pub struct RouteResolver {
    provider: Arc<dyn RoutingProvider>,
    timeout: Duration,
}

impl RouteResolver {
    pub fn new(provider: Arc<dyn RoutingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn resolve(&self, origin: Coordinate, destination: Coordinate) -> RouteResult {
        match tokio::time::timeout(self.timeout, self.provider.route(origin, destination)).await {
            Ok(Ok(route)) => {
                debug!("Resolved route of {:.3} km with {} points", route.distance_km, route.path.len());
                route
            }
            Ok(Err(err)) => {
                warn!("Routing from {} to {} failed: {}", origin, destination, err);
                RouteResult::unresolved()
            }
            Err(_) => {
                warn!("Routing from {} to {} timed out after {:?}", origin, destination, self.timeout);
                RouteResult::unresolved()
            }
        }
    }
}
