use async_trait::async_trait;
use pace_tracker_lib::{Coordinate, RouteResult, RoutingError, RoutingProvider};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{Configuration, DataManagerError};

/// Driving routes from an OSRM server.
#[derive(Clone)]
pub struct OsrmRouting {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Metres.
    distance: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[lon, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmRouting {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Configuration) -> Result<Self, DataManagerError> {
        Ok(Self::new(super::http_client(config)?, config.osrm_url.clone()))
    }

    fn url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, origin.longitude, origin.latitude, destination.longitude, destination.latitude
        )
    }
}

fn route_from_response(response: OsrmResponse) -> Result<RouteResult, RoutingError> {
    if response.code != "Ok" {
        debug!("OSRM answered {}: {}", response.code, response.message.unwrap_or_default());
        return Err(RoutingError::NoRoute);
    }

    let route = response.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
    let path = route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| Coordinate::new(lat, lon))
        .collect();

    Ok(RouteResult::new(route.distance / 1000.0, path))
}

#[async_trait]
impl RoutingProvider for OsrmRouting {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult, RoutingError> {
        let response = self
            .client
            .get(self.url(origin, destination))
            .send()
            .await
            .map_err(|err| RoutingError::Network(err.to_string()))?;

        // OSRM reports "no route" with a 400 and a JSON body, so the status is
        // not checked before decoding.
        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| RoutingError::Malformed(err.to_string()))?;

        route_from_response(body)
    }
}
