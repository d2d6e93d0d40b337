use std::{path::{Path, PathBuf}, str::FromStr, time::Duration};

use chrono::FixedOffset;
use pace_tracker_lib::{refresh::{RefreshLevel, RefreshPolicy}, ArrivalZone, EngineConfig};
use tracing::warn;

use crate::{history::DEFAULT_RECENT_CAPACITY, project_path, DataManagerError, CONFIG_PATH};

pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = concat!("pace_tracker/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct Configuration {
    pub osrm_url: String,
    pub nominatim_url: String,
    pub user_agent: String,
    pub http_timeout: Duration,

    pub engine: EngineConfig,

    pub recent_capacity: usize,
    /// Overrides the history file in the project's data directory.
    pub history_file: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout: Duration::from_secs(10),
            engine: EngineConfig::default(),
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            history_file: None,
        }
    }
}

impl Configuration {
    /// Parses `key = value` lines. Blank lines and `#` comments are skipped,
    /// unknown keys are logged and ignored.
    pub fn parse(text: &str) -> Result<Self, DataManagerError> {
        let mut config = Configuration::default();
        let mut refresh_levels = None;
        let mut refresh_fallback = None;

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(DataManagerError::Config(format!("Line {} is not `key = value`: {:?}", index + 1, line)));
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "osrm_url" => config.osrm_url = value.trim_end_matches('/').to_string(),
                "nominatim_url" => config.nominatim_url = value.trim_end_matches('/').to_string(),
                "user_agent" => config.user_agent = value.to_string(),
                "http_timeout_secs" => config.http_timeout = seconds(key, value)?,
                "position_timeout_secs" => config.engine.position_timeout = seconds(key, value)?,
                "route_timeout_secs" => config.engine.route_timeout = seconds(key, value)?,
                "initial_timeout_secs" => config.engine.initial_timeout = seconds(key, value)?,
                "refresh_levels" => refresh_levels = Some(parse_levels(value)?),
                "refresh_fallback_secs" => refresh_fallback = Some(seconds(key, value)?),
                "utc_offset_minutes" => {
                    let minutes: i32 = number(key, value)?;
                    let offset = minutes
                        .checked_mul(60)
                        .and_then(FixedOffset::east_opt)
                        .ok_or_else(|| DataManagerError::Config(format!("UTC offset out of range: {}", value)))?;
                    config.engine.arrival_zone = ArrivalZone::Fixed(offset);
                }
                "recent_capacity" => {
                    config.recent_capacity = number(key, value)?;
                    if config.recent_capacity == 0 {
                        return Err(DataManagerError::Config(format!("{} must be positive", key)));
                    }
                }
                "history_file" => config.history_file = Some(PathBuf::from(value)),
                _ => {
                    warn!("Unknown config key: {}", key);
                }
            }
        }

        if refresh_levels.is_some() || refresh_fallback.is_some() {
            let current = &config.engine.refresh_policy;
            config.engine.refresh_policy = RefreshPolicy::new(
                refresh_levels.unwrap_or_else(|| current.levels().to_vec()),
                refresh_fallback.unwrap_or(current.fallback()),
            );
        }

        Ok(config)
    }

    /// Loads the config file in the project's data directory.
    pub async fn start() -> Result<Self, DataManagerError> {
        Self::load(&project_path(CONFIG_PATH)?).await
    }

    /// Like [`Configuration::start`], but the defaults are used when there is
    /// no project data directory or its config file can't be read. A config
    /// file that is there but malformed is still an error.
    pub async fn start_or_default() -> Result<Self, DataManagerError> {
        or_default(Self::start().await)
    }

    /// Reads and parses the file at `path`. A missing file gives the defaults.
    pub async fn load(path: &Path) -> Result<Self, DataManagerError> {
        if !path.exists() {
            return Ok(Configuration::default());
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| DataManagerError::Storage(format!("Failed to read config file: {:?}", path)))?;
        Self::parse(&text)
    }
}

fn or_default(loaded: Result<Configuration, DataManagerError>) -> Result<Configuration, DataManagerError> {
    match loaded {
        Err(DataManagerError::Storage(err)) => {
            warn!("Using default configuration: {}", err);
            Ok(Configuration::default())
        }
        loaded => loaded,
    }
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T, DataManagerError> {
    value
        .parse()
        .map_err(|_| DataManagerError::Config(format!("Invalid value for {}: {:?}", key, value)))
}

fn seconds(key: &str, value: &str) -> Result<Duration, DataManagerError> {
    let secs: u64 = number(key, value)?;
    if secs == 0 {
        return Err(DataManagerError::Config(format!("{} must be positive", key)));
    }
    Ok(Duration::from_secs(secs))
}

/// `60:1,120:3,300:5` style threshold:interval pairs, in seconds.
fn parse_levels(value: &str) -> Result<Vec<RefreshLevel>, DataManagerError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (threshold, interval) = pair
                .split_once(':')
                .ok_or_else(|| DataManagerError::Config(format!("Refresh level is not threshold:interval: {:?}", pair)))?;
            let threshold: f64 = number("refresh_levels", threshold.trim())?;
            let interval = seconds("refresh_levels", interval.trim())?;
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(DataManagerError::Config(format!("Bad refresh threshold: {:?}", pair)));
            }
            Ok(RefreshLevel::new(threshold, interval.as_secs()))
        })
        .collect()
}
