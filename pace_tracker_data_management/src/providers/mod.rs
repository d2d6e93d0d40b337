//! Concrete collaborators for the trip engine.

mod fixed_position;
mod nominatim;
mod osrm;
mod straight_line;

pub use fixed_position::FixedPosition;
pub use nominatim::NominatimGeocoding;
pub use osrm::OsrmRouting;
pub use straight_line::StraightLineRouting;

use reqwest::Client;

use crate::{Configuration, DataManagerError};

/// HTTP client shared by the online providers.
pub fn http_client(config: &Configuration) -> Result<Client, DataManagerError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.http_timeout)
        .build()
        .map_err(|err| DataManagerError::Provider(format!("Failed to build HTTP client: {}", err)))
}
