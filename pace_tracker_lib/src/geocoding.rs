use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    coordinate::{Coordinate, Place},
    error::TripError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodingError {
    #[error("geocoding request failed: {0}")]
    Network(String),
    #[error("malformed geocoding response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Candidates for `text`, best match first. Empty when nothing matches.
    async fn search(&self, text: &str) -> Result<Vec<Place>, GeocodingError>;

    async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError>;
}

#[derive(Clone)]
pub struct Geocoder {
    provider: Arc<dyn GeocodingProvider>,
}

impl Geocoder {
    pub fn new(provider: Arc<dyn GeocodingProvider>) -> Self {
        Self { provider }
    }

    /// Picks the first candidate for `text`.
    pub async fn locate(&self, text: &str) -> Result<Place, TripError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(TripError::DestinationNotFound(text.to_string()));
        }

        match self.provider.search(query).await {
            Ok(candidates) => {
                debug!("{} candidates for {:?}", candidates.len(), query);
                candidates
                    .into_iter()
                    .next()
                    .ok_or_else(|| TripError::DestinationNotFound(query.to_string()))
            }
            Err(err) => {
                warn!("Searching for {:?} failed: {}", query, err);
                Err(TripError::DestinationNotFound(query.to_string()))
            }
        }
    }

    /// Best-effort name for a coordinate, falling back to the coordinate itself.
    pub async fn display_name(&self, coordinate: Coordinate) -> String {
        match self.provider.reverse(coordinate).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => coordinate.to_string(),
            Err(err) => {
                debug!("Reverse geocoding {} failed: {}", coordinate, err);
                coordinate.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gazetteer;

    #[async_trait]
    impl GeocodingProvider for Gazetteer {
        async fn search(&self, text: &str) -> Result<Vec<Place>, GeocodingError> {
            match text {
                "aarhus" => Ok(vec![
                    Place::new("Aarhus, Denmark", Coordinate::new(56.15, 10.21)),
                    Place::new("Aarhus Airport", Coordinate::new(56.30, 10.62)),
                ]),
                "offline" => Err(GeocodingError::Network("connection refused".into())),
                _ => Ok(Vec::new()),
            }
        }

        async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError> {
            if coordinate.latitude > 0.0 {
                Ok("Somewhere north".into())
            } else {
                Err(GeocodingError::Malformed("no address".into()))
            }
        }
    }

    #[tokio::test]
    async fn first_candidate_wins() {
        let geocoder = Geocoder::new(Arc::new(Gazetteer));
        let place = geocoder.locate("  aarhus ").await.unwrap();
        assert_eq!(place.name, "Aarhus, Denmark");
    }

    #[tokio::test]
    async fn nothing_found_or_failure_is_destination_not_found() {
        let geocoder = Geocoder::new(Arc::new(Gazetteer));
        assert_eq!(
            geocoder.locate("atlantis").await,
            Err(TripError::DestinationNotFound("atlantis".into()))
        );
        assert!(matches!(geocoder.locate("offline").await, Err(TripError::DestinationNotFound(_))));
        assert!(matches!(geocoder.locate("   ").await, Err(TripError::DestinationNotFound(_))));
    }

    #[tokio::test]
    async fn reverse_falls_back_to_coordinate() {
        let geocoder = Geocoder::new(Arc::new(Gazetteer));
        assert_eq!(geocoder.display_name(Coordinate::new(1.0, 2.0)).await, "Somewhere north");
        assert_eq!(geocoder.display_name(Coordinate::new(-1.0, 2.0)).await, "-1.00000, 2.00000");
    }
}
