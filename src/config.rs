//! Application-level configuration loading: storage backend, commit retries, event buffers.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KILLER_ROUNDS_CONFIG_PATH";

const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 8;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Persistence backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local store; state is lost on restart.
    #[default]
    Memory,
    /// MongoDB, configured through `MONGO_URI`/`MONGO_DB`.
    Mongo,
    /// CouchDB, configured through the `COUCH_*` variables.
    Couch,
}

/// Tuning of the read-modify-write loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many times an operation is re-applied after losing a compare-and-swap race.
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

/// Buffering of per-game change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Capacity of each game's broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Persistence backend.
    pub storage: StorageBackend,
    /// Commit loop settings.
    pub engine: EngineConfig,
    /// Notification settings.
    pub events: EventsConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        storage = ?config.storage,
                        max_commit_attempts = config.engine.max_commit_attempts,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document, clamping values that would disable the service.
    fn parse(contents: &str) -> serde_json::Result<Self> {
        let mut config = serde_json::from_str::<Self>(contents)?;
        if config.engine.max_commit_attempts == 0 {
            warn!("engine.max_commit_attempts must be at least 1; using 1");
            config.engine.max_commit_attempts = 1;
        }
        if config.events.channel_capacity == 0 {
            warn!("events.channel_capacity must be at least 1; using the default");
            config.events.channel_capacity = DEFAULT_CHANNEL_CAPACITY;
        }
        Ok(config)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
