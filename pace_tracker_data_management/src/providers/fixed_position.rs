use async_trait::async_trait;
use pace_tracker_lib::{Coordinate, PositionError, PositionProvider};

/// Always reports the same coordinate. Stands in for a GPS fix on hosts
/// without one.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinate);

#[async_trait]
impl PositionProvider for FixedPosition {
    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        Ok(self.0)
    }
}
