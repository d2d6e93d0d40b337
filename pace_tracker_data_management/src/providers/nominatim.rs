use async_trait::async_trait;
use pace_tracker_lib::{Coordinate, GeocodingError, GeocodingProvider, Place};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{Configuration, DataManagerError};

const SEARCH_LIMIT: &str = "5";

/// Place search and reverse lookup against a Nominatim server.
///
/// Nominatim's usage policy requires an identifying User-Agent, which the
/// client from [`super::http_client`] carries.
#[derive(Clone)]
pub struct NominatimGeocoding {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
    error: Option<String>,
}

impl NominatimGeocoding {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Configuration) -> Result<Self, DataManagerError> {
        Ok(Self::new(super::http_client(config)?, config.nominatim_url.clone()))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, GeocodingError> {
        self.client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(&[("format", "jsonv2")])
            .query(query)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| GeocodingError::Network(err.to_string()))?
            .json()
            .await
            .map_err(|err| GeocodingError::Malformed(err.to_string()))
    }
}

fn places_from_response(candidates: Vec<NominatimPlace>) -> Result<Vec<Place>, GeocodingError> {
    candidates
        .into_iter()
        .map(|candidate| {
            let coordinate = format!("{},{}", candidate.lat, candidate.lon);
            Coordinate::parse(&coordinate)
                .map(|coordinate| Place::new(candidate.display_name, coordinate))
                .ok_or_else(|| GeocodingError::Malformed(format!("bad coordinate {}", coordinate)))
        })
        .collect()
}

fn name_from_response(response: NominatimReverse) -> Result<String, GeocodingError> {
    match (response.display_name, response.error) {
        (Some(name), _) => Ok(name),
        (None, Some(error)) => Err(GeocodingError::Malformed(error)),
        (None, None) => Err(GeocodingError::Malformed("no display_name".to_string())),
    }
}

#[async_trait]
impl GeocodingProvider for NominatimGeocoding {
    async fn search(&self, text: &str) -> Result<Vec<Place>, GeocodingError> {
        let candidates: Vec<NominatimPlace> = self.get("search", &[("limit", SEARCH_LIMIT), ("q", text)]).await?;
        debug!("Nominatim found {} places for {:?}", candidates.len(), text);
        places_from_response(candidates)
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError> {
        let lat = coordinate.latitude.to_string();
        let lon = coordinate.longitude.to_string();
        let response: NominatimReverse = self.get("reverse", &[("lat", lat.as_str()), ("lon", lon.as_str())]).await?;
        name_from_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_results_keep_order() {
        let body = r#"[
            {"place_id": 1, "lat": "56.1496278", "lon": "10.2134046", "display_name": "Aarhus, Region Midtjylland, Danmark", "importance": 0.7},
            {"place_id": 2, "lat": "56.3039", "lon": "10.6196", "display_name": "Aarhus Lufthavn, Danmark", "importance": 0.4}
        ]"#;

        let places = places_from_response(serde_json::from_str(body).unwrap()).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Aarhus, Region Midtjylland, Danmark");
        assert_eq!(places[0].coordinate, Coordinate::new(56.1496278, 10.2134046));
        assert_eq!(places[1].name, "Aarhus Lufthavn, Danmark");
    }

    #[test]
    fn empty_search_is_empty() {
        let places = places_from_response(serde_json::from_str("[]").unwrap()).unwrap();
        assert!(places.is_empty());
    }

    #[test]
    fn unparseable_coordinate_is_malformed() {
        let body = r#"[{"lat": "north", "lon": "10.2", "display_name": "Nowhere"}]"#;
        assert!(matches!(
            places_from_response(serde_json::from_str(body).unwrap()),
            Err(GeocodingError::Malformed(_))
        ));
    }

    #[test]
    fn reverse_uses_display_name_or_error() {
        let found: NominatimReverse =
            serde_json::from_str(r#"{"display_name": "Strandvejen 1, Aarhus", "address": {}}"#).unwrap();
        assert_eq!(name_from_response(found).unwrap(), "Strandvejen 1, Aarhus");

        let missing: NominatimReverse = serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert_eq!(
            name_from_response(missing),
            Err(GeocodingError::Malformed("Unable to geocode".to_string()))
        );
    }
}
