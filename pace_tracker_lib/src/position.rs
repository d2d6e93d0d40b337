use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{coordinate::Coordinate, error::PositionUnavailable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("permission to read the position was denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("positioning is not supported here")]
    Unsupported,
}

/// Where the driver currently is.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, PositionError>;
}

/// Single-shot position reads with a timeout.
#[derive(Clone)]
pub struct PositionSampler {
    provider: Arc<dyn PositionProvider>,
    timeout: Duration,
}

impl PositionSampler {
    pub fn new(provider: Arc<dyn PositionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Never retries; a failed sample waits for the next scheduled cycle.
    pub async fn sample(&self) -> Result<Coordinate, PositionUnavailable> {
        let result = match tokio::time::timeout(self.timeout, self.provider.current_position()).await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err(err)) => Err(PositionUnavailable(err.to_string())),
            Err(_) => Err(PositionUnavailable(format!("no fix within {:?}", self.timeout))),
        };

        match &result {
            Ok(position) => debug!("Sampled position {}", position),
            Err(err) => warn!("{}", err),
        }

        result
    }
}
