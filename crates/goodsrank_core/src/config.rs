//! Layered runtime configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`GOODSRANK_*`, `__` separates sections, e.g.
//!    `GOODSRANK_CACHE__TTL_SECS=30`)
//! 2. A TOML file (`goodsrank.toml` in the working directory, or an explicit
//!    path)
//! 3. Built-in defaults
//!
//! Every setting has a default, so an empty environment yields a usable
//! configuration.

use crate::cache::{CachePolicy, DEFAULT_TTL};
use crate::logging::default_log_level;
use crate::notify::{DEFAULT_CHANNEL, DEFAULT_TOPIC};
use crate::repo::goods_repo::WindowPolicy;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GOODSRANK_";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "goodsrank.toml";

/// Default page size for list queries.
pub const DEFAULT_LIST_LIMIT: u32 = 10;

#[derive(Debug)]
pub enum ConfigError {
    Figment(Box<figment::Error>),
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Figment(err) => write!(f, "configuration error: {err}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid configuration value for `{field}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Figment(err) => Some(err.as_ref()),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("goodsrank.sqlite3"),
        }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Per-process map; entries die with the process.
    Memory,
    /// Shared SQLite cache file.
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Cache file, used by the `sqlite` backend.
    pub path: PathBuf,
    pub ttl_secs: u64,
    pub policy: CachePolicy,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: PathBuf::from("goodsrank_cache.sqlite3"),
            ttl_secs: DEFAULT_TTL.as_secs(),
            policy: CachePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RankingConfig {
    pub window_policy: WindowPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListConfig {
    pub default_limit: u32,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory; file logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotifyConfig {
    pub channel: String,
    pub topic: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// Loads defaults, then `goodsrank.toml` when present, then env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        let file = local.exists().then_some(local);
        Self::extract(Self::figment(file.as_deref()))
    }

    /// Loads with an explicit config file instead of the working-directory one.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::extract(Self::figment(Some(path.as_ref())))
    }

    /// Builds the provider chain without extracting it.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.list.default_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "list.default_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.notify.channel.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "notify.channel",
                reason: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, CacheBackend};
    use crate::cache::CachePolicy;
    use crate::repo::goods_repo::WindowPolicy;

    #[test]
    fn defaults_follow_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.policy, CachePolicy::TtlOnly);
        assert_eq!(config.ranking.window_policy, WindowPolicy::Tail);
        assert_eq!(config.list.default_limit, 10);
        assert_eq!(config.notify.channel, "event");
        assert_eq!(config.notify.topic, "log-events");
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn figment_without_sources_extracts_defaults() {
        let config: AppConfig = AppConfig::figment(None).extract().unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
