use async_trait::async_trait;
use pace_tracker_lib::{Coordinate, RouteResult, RoutingError, RoutingProvider};

/// Offline routing: great-circle distance, path straight to the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineRouting;

#[async_trait]
impl RoutingProvider for StraightLineRouting {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, RoutingError> {
        Ok(RouteResult::new(origin.haversine_km(&destination), vec![origin, destination]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distance_is_great_circle() {
        // Aarhus to Copenhagen, roughly 156 km as the crow flies
        let aarhus = Coordinate::new(56.1629, 10.2039);
        let copenhagen = Coordinate::new(55.6761, 12.5683);

        let route = StraightLineRouting.route(aarhus, copenhagen).await.unwrap();
        assert!((route.distance_km - 156.0).abs() < 3.0, "{}", route.distance_km);
        assert_eq!(route.path, vec![aarhus, copenhagen]);
    }

    #[tokio::test]
    async fn same_point_is_unresolved() {
        let here = Coordinate::new(56.0, 10.0);
        let route = StraightLineRouting.route(here, here).await.unwrap();
        assert!(!route.is_resolved());
    }
}
