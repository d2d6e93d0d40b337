use std::path::PathBuf;

use const_format::concatcp;
use thiserror::Error;

pub mod configuration;
pub mod history;
pub mod providers;

pub use configuration::Configuration;
pub use history::{DestinationHistory, HistoryManager};

pub const DATA_DIR: &str = "data/";
pub const HISTORY_PATH: &str = concatcp!(DATA_DIR, "history.json");
pub const CONFIG_PATH: &str = concatcp!(DATA_DIR, "pace_tracker.conf");

#[derive(Debug, Error)]
pub enum DataManagerError {
    #[error("storage: {0}")]
    Storage(String),
    #[error("format: {0}")]
    Format(String),
    #[error("provider: {0}")]
    Provider(String),
    #[error("config: {0}")]
    Config(String),
}

/// Resolves a path relative to the project root, e.g. [`HISTORY_PATH`].
pub fn project_path(relative: &str) -> Result<PathBuf, DataManagerError> {
    let root = project_root::get_project_root()
        .map_err(|err| DataManagerError::Storage(format!("Failed to find project root: {}", err)))?;
    Ok(root.join(relative))
}
