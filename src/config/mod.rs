//! Gateway configuration.
//!
//! Read from a versioned YAML file with flat keys. Every key can be
//! overridden by the environment variable of the same name in upper case,
//! e.g. `database_host` by `DATABASE_HOST`.

use core::error;
use std::{fmt::Display, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::connection::ReconnectPolicy;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_PATH: &str = "/etc/span-gateway/config.yml";

fn default_initial_backoff_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub config_version: u32,

    #[serde(default)]
    pub database_host: String,
    #[serde(default)]
    pub database_port: u16,
    #[serde(default)]
    pub database_username: String,
    #[serde(default)]
    pub database_password: String,
    #[serde(default)]
    pub database_dbname: String,

    /// Address the HTTP server binds to, e.g. `0.0.0.0:1317`.
    #[serde(default)]
    pub listen_addr: String,

    #[serde(default = "default_initial_backoff_secs")]
    pub reconnect_initial_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub reconnect_max_backoff_secs: u64,
}

impl GatewayConfig {
    /// Loads the file at `path`, applies environment overrides and validates
    /// the result. Any failure here is fatal at startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::Parse)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        override_from_env("CONFIG_VERSION", &mut self.config_version)?;
        override_from_env("DATABASE_HOST", &mut self.database_host)?;
        override_from_env("DATABASE_PORT", &mut self.database_port)?;
        override_from_env("DATABASE_USERNAME", &mut self.database_username)?;
        override_from_env("DATABASE_PASSWORD", &mut self.database_password)?;
        override_from_env("DATABASE_DBNAME", &mut self.database_dbname)?;
        override_from_env("LISTEN_ADDR", &mut self.listen_addr)?;
        override_from_env(
            "RECONNECT_INITIAL_BACKOFF_SECS",
            &mut self.reconnect_initial_backoff_secs,
        )?;
        override_from_env(
            "RECONNECT_MAX_BACKOFF_SECS",
            &mut self.reconnect_max_backoff_secs,
        )?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config_version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch {
                wanted: CONFIG_VERSION,
                found: self.config_version,
            });
        }
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("listen_addr must be set".to_owned()));
        }
        if self.reconnect_initial_backoff_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconnect_initial_backoff_secs must be at least 1".to_owned(),
            ));
        }
        if self.reconnect_max_backoff_secs < self.reconnect_initial_backoff_secs {
            return Err(ConfigError::Invalid(
                "reconnect_max_backoff_secs must not be below reconnect_initial_backoff_secs"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// The fixed descriptor every reconnection attempt uses.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.database_host)
            .port(self.database_port)
            .username(&self.database_username)
            .password(&self.database_password)
            .database(&self.database_dbname)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_secs(self.reconnect_initial_backoff_secs),
            max_backoff: Duration::from_secs(self.reconnect_max_backoff_secs),
            max_attempts: None,
        }
    }
}

fn override_from_env<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = dotenvy::var(key) {
        *target = raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} has an invalid value: {raw:?}")))?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum ConfigError {
    Read(String, std::io::Error),
    Parse(serde_yaml::Error),
    VersionMismatch { wanted: u32, found: u32 },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(path, err) => write!(f, "Failed to read config file {path}: {err}"),
            Self::Parse(err) => write!(f, "Failed to parse config file: {err}"),
            Self::VersionMismatch { wanted, found } => write!(
                f,
                "Cannot use the given config file as its config_version does not match. Wanted {wanted} but found {found}"
            ),
            Self::Invalid(err_str) => write!(f, "Invalid config: {err_str}"),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ConfigError::Read(_, err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::VersionMismatch { .. } => None,
            ConfigError::Invalid(_) => None,
        }
    }
}
