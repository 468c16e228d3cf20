//! Process configuration read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use sextant_observability::LogFormat;

pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEV_ADMIN_PASSWORD: &str = "ChangeMe!2024";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin.user@example.com";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs on in-memory stores.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub log_format: LogFormat,
    /// Static bundle served for unmatched paths.
    pub static_dir: Option<PathBuf>,
    pub admin_email: String,
    pub admin_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            database_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl: Duration::minutes(60),
            log_format: LogFormat::Json,
            static_dir: None,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEV_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", &raw, e))?,
            None => defaults.bind_addr,
        };

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(0) => return Err(ConfigError::invalid("DATABASE_MAX_CONNECTIONS", &raw, "must be at least 1")),
                Ok(n) => n,
                Err(e) => return Err(ConfigError::invalid("DATABASE_MAX_CONNECTIONS", &raw, e)),
            },
            None => defaults.database_max_connections,
        };

        let jwt_ttl = match get("JWT_TTL_MINUTES") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(minutes) if minutes > 0 => Duration::minutes(minutes),
                Ok(_) => return Err(ConfigError::invalid("JWT_TTL_MINUTES", &raw, "must be positive")),
                Err(e) => return Err(ConfigError::invalid("JWT_TTL_MINUTES", &raw, e)),
            },
            None => defaults.jwt_ttl,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", &raw, e))?,
            None => defaults.log_format,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            jwt_secret: get("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_ttl,
            log_format,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            admin_email: get("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            admin_password: get("ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
        })
    }

    /// Log a warning for every insecure development default still in use.
    pub fn warn_on_defaults(&self) {
        if self.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
        }
        if self.admin_password == DEV_ADMIN_PASSWORD {
            tracing::warn!("ADMIN_PASSWORD not set; using insecure dev default");
        }
        if self.database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; data is kept in memory only");
        }
    }
}
