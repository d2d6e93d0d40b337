use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use pace_tracker_lib::{Coordinate, GeocodingError, GeocodingProvider, Place};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{project_path, Configuration, DataManagerError, HISTORY_PATH};

pub const DEFAULT_RECENT_CAPACITY: usize = 5;

/// The recent and saved destination lists.
///
/// Both lists are keyed by place name. Recent is most-recent-first and
/// capped, saved keeps insertion order and only shrinks when asked to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DestinationHistory {
    pub recent: Vec<Place>,
    pub saved: Vec<Place>,
}

impl DestinationHistory {
    /// Moves `place` to the front of the recent list.
    pub fn remember(&mut self, place: Place, capacity: usize) {
        self.recent.retain(|existing| existing.name != place.name);
        self.recent.insert(0, place);
        self.recent.truncate(capacity);
    }

    /// Returns false if a place with that name was already saved; its
    /// coordinate is updated in place.
    pub fn save(&mut self, place: Place) -> bool {
        match self.saved.iter_mut().find(|existing| existing.name == place.name) {
            Some(existing) => {
                existing.coordinate = place.coordinate;
                false
            }
            None => {
                self.saved.push(place);
                true
            }
        }
    }

    pub fn unsave(&mut self, name: &str) -> bool {
        remove_named(&mut self.saved, name)
    }

    /// Drops `name` from the recent list.
    pub fn forget(&mut self, name: &str) -> bool {
        remove_named(&mut self.recent, name)
    }
}

fn remove_named(places: &mut Vec<Place>, name: &str) -> bool {
    let before = places.len();
    places.retain(|place| place.name != name);
    places.len() != before
}

/// Shared handle to the on-disk destination history.
///
/// Every mutation is written through before it returns.
#[derive(Clone)]
pub struct HistoryManager {
    path: PathBuf,
    recent_capacity: usize,
    history: Arc<Mutex<DestinationHistory>>,
}

impl HistoryManager {
    /// Opens the history file in the project's data directory.
    pub async fn start() -> Result<Self, DataManagerError> {
        Self::open(project_path(HISTORY_PATH)?, DEFAULT_RECENT_CAPACITY).await
    }

    /// Opens the configured history file, or the default one.
    pub async fn from_config(config: &Configuration) -> Result<Self, DataManagerError> {
        let path = match &config.history_file {
            Some(path) => path.clone(),
            None => project_path(HISTORY_PATH)?,
        };
        Self::open(path, config.recent_capacity).await
    }

    /// Opens (or prepares to create) the history file at `path`.
    pub async fn open(path: impl Into<PathBuf>, recent_capacity: usize) -> Result<Self, DataManagerError> {
        let path = path.into();

        let history = if path.exists() {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|_| DataManagerError::Storage(format!("Failed to read history file: {:?}", path)))?;
            serde_json::from_slice(&bytes)
                .map_err(|err| DataManagerError::Format(format!("History file {:?} is corrupt: {}", path, err)))?
        } else {
            debug!("No history at {:?} yet", path);
            DestinationHistory::default()
        };

        Ok(HistoryManager {
            path,
            recent_capacity,
            history: Arc::new(Mutex::new(history)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn recent(&self) -> Vec<Place> {
        self.history.lock().await.recent.clone()
    }

    pub async fn saved(&self) -> Vec<Place> {
        self.history.lock().await.saved.clone()
    }

    pub async fn remember(&self, place: Place) -> Result<(), DataManagerError> {
        let mut history = self.history.lock().await;
        history.remember(place, self.recent_capacity);
        self.persist(&history).await
    }

    pub async fn save(&self, place: Place) -> Result<bool, DataManagerError> {
        let mut history = self.history.lock().await;
        let added = history.save(place);
        self.persist(&history).await?;
        Ok(added)
    }

    pub async fn unsave(&self, name: &str) -> Result<bool, DataManagerError> {
        let mut history = self.history.lock().await;
        let removed = history.unsave(name);
        if removed {
            self.persist(&history).await?;
        }
        Ok(removed)
    }

    pub async fn forget(&self, name: &str) -> Result<bool, DataManagerError> {
        let mut history = self.history.lock().await;
        let removed = history.forget(name);
        if removed {
            self.persist(&history).await?;
        }
        Ok(removed)
    }

    // Replaced through a sibling temp file
    async fn persist(&self, history: &DestinationHistory) -> Result<(), DataManagerError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|_| DataManagerError::Storage(format!("Failed to create history directory: {:?}", dir)))?;
        }

        let bytes = serde_json::to_vec_pretty(history)
            .map_err(|err| DataManagerError::Format(format!("Failed to encode history: {}", err)))?;

        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|_| DataManagerError::Storage(format!("Failed to write history file: {:?}", temp)))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|_| DataManagerError::Storage(format!("Failed to replace history file: {:?}", self.path)))?;

        info!(
            "History saved: {} recent, {} saved",
            history.recent.len(),
            history.saved.len()
        );
        Ok(())
    }
}

/// The history doubles as an offline gazetteer: saved places first, then
/// recent ones, matched case-insensitively on their names.
#[async_trait]
impl GeocodingProvider for HistoryManager {
    async fn search(&self, text: &str) -> Result<Vec<Place>, GeocodingError> {
        let needle = text.to_lowercase();
        let history = self.history.lock().await;

        let mut matches: Vec<Place> = Vec::new();
        for place in history.saved.iter().chain(history.recent.iter()) {
            let name = place.name.to_lowercase();
            if name.contains(&needle) && !matches.iter().any(|found| found.name == place.name) {
                matches.push(place.clone());
            }
        }

        // An exact name beats a partial one
        if let Some(exact) = matches.iter().position(|place| place.name.to_lowercase() == needle) {
            let place = matches.remove(exact);
            matches.insert(0, place);
        }
        Ok(matches)
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<String, GeocodingError> {
        let history = self.history.lock().await;
        history
            .saved
            .iter()
            .chain(history.recent.iter())
            .find(|place| place.coordinate == coordinate)
            .map(|place| place.name.clone())
            .ok_or_else(|| GeocodingError::Malformed(format!("{} is not in the history", coordinate)))
    }
}
