//! Connection pool configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SqlError, SqlResult};

/// Environment variable overriding the configured database URL.
pub const DATABASE_URL_ENV: &str = "SQLCACHE_DATABASE_URL";

const DEFAULT_MAX_OPEN: u32 = 10;
const DEFAULT_MAX_IDLE: u32 = 5;
const DEFAULT_MAX_LIFETIME_SECS: u64 = 60 * 60;
const DEFAULT_MAX_IDLE_TIME_SECS: u64 = 30 * 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Pool sizing and lifetimes. Zero means "unset" and takes the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Database connection URL
    pub url: String,
    pub max_open: u32,
    /// Ceiling on idle connections. The sqlx pool has no idle cap and
    /// keeps no idle floor; `max_idle_time_secs` does the reaping.
    pub max_idle: u32,
    pub max_lifetime_secs: u64,
    pub max_idle_time_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/postgres".to_string(),
            max_open: DEFAULT_MAX_OPEN,
            max_idle: DEFAULT_MAX_IDLE,
            max_lifetime_secs: DEFAULT_MAX_LIFETIME_SECS,
            max_idle_time_secs: DEFAULT_MAX_IDLE_TIME_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn max_open(mut self, max: u32) -> Self {
        self.max_open = max;
        self
    }

    /// Connections kept open while idle.
    pub fn max_idle(mut self, max: u32) -> Self {
        self.max_idle = max;
        self
    }

    /// Recycle connections older than this.
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime_secs = lifetime.as_secs();
        self
    }

    /// Close connections idle longer than this.
    pub fn max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time_secs = idle.as_secs();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn idle_time(&self) -> Duration {
        Duration::from_secs(self.max_idle_time_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Replace unset (zero) fields with defaults and cap idle at open.
    pub fn normalized(mut self) -> Self {
        if self.max_open == 0 {
            self.max_open = DEFAULT_MAX_OPEN;
        }
        if self.max_idle == 0 {
            self.max_idle = DEFAULT_MAX_IDLE;
        }
        self.max_idle = self.max_idle.min(self.max_open);
        if self.max_lifetime_secs == 0 {
            self.max_lifetime_secs = DEFAULT_MAX_LIFETIME_SECS;
        }
        if self.max_idle_time_secs == 0 {
            self.max_idle_time_secs = DEFAULT_MAX_IDLE_TIME_SECS;
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECS;
        }
        self
    }

    pub fn from_toml_str(s: &str) -> SqlResult<Self> {
        let config: PoolConfig = toml::from_str(s)?;
        Ok(config.normalized())
    }

    pub fn load(path: impl AsRef<Path>) -> SqlResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// `<config dir>/sqlcache/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlcache").join("config.toml"))
    }

    /// Load the default config file if present, then apply
    /// [`DATABASE_URL_ENV`].
    pub fn load_default() -> SqlResult<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.url = url;
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> SqlResult<String> {
        toml::to_string_pretty(self).map_err(|e| SqlError::Config(e.to_string()))
    }
}
