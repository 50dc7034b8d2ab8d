//! Application-level configuration loading: room lifetime, code generation and write tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ROOMS_CONFIG_PATH";

const DEFAULT_ROOM_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 8;
const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 10;
const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    room_ttl: Duration,
    code_length: usize,
    max_code_attempts: u32,
    max_write_attempts: u32,
    transaction_timeout: Option<Duration>,
    eviction_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        room_ttl_secs = app_config.room_ttl.as_secs(),
                        code_length = app_config.code_length,
                        "loaded room settings from config"
                    );
                    app_config
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

    /// Parse a JSON document. Missing keys take their default value.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// How long a room lives after creation.
    pub fn room_ttl(&self) -> Duration {
        self.room_ttl
    }

    /// Number of characters in a generated room code.
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Codes tried before room creation gives up.
    pub fn max_code_attempts(&self) -> u32 {
        self.max_code_attempts
    }

    /// Load/mutate/save rounds tried before a write gives up on version conflicts.
    pub fn max_write_attempts(&self) -> u32 {
        self.max_write_attempts
    }

    /// Upper bound for a single room transaction; `None` disables it.
    pub fn transaction_timeout(&self) -> Option<Duration> {
        self.transaction_timeout
    }

    /// Delay between two expired-room sweeps.
    pub fn eviction_interval(&self) -> Duration {
        self.eviction_interval
    }

    /// Override the room lifetime.
    pub fn with_room_ttl(mut self, ttl: Duration) -> Self {
        self.room_ttl = ttl;
        self
    }

    /// Override the transaction timeout.
    pub fn with_transaction_timeout(mut self, limit: Option<Duration>) -> Self {
        self.transaction_timeout = limit;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    room_ttl_secs: u64,
    code_length: usize,
    max_code_attempts: u32,
    max_write_attempts: u32,
    /// `0` disables the timeout.
    transaction_timeout_ms: u64,
    eviction_interval_secs: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            room_ttl_secs: DEFAULT_ROOM_TTL_SECS,
            code_length: DEFAULT_CODE_LENGTH,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            transaction_timeout_ms: DEFAULT_TRANSACTION_TIMEOUT_MS,
            eviction_interval_secs: DEFAULT_EVICTION_INTERVAL_SECS,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            room_ttl: Duration::from_secs(value.room_ttl_secs.max(1)),
            code_length: value.code_length.clamp(4, 12),
            max_code_attempts: value.max_code_attempts.max(1),
            max_write_attempts: value.max_write_attempts.max(1),
            transaction_timeout: (value.transaction_timeout_ms > 0)
                .then(|| Duration::from_millis(value.transaction_timeout_ms)),
            eviction_interval: Duration::from_secs(value.eviction_interval_secs.max(1)),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
