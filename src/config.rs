use std::net::IpAddr;

use thiserror::Error;

use crate::store::snapshot::RetentionPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub manager_badges: Vec<String>,
    pub badge_scan_window_ms: i64,
    pub retention: RetentionPolicy,
}

impl Config {
    /// Reads configuration from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a local `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let host = match lookup("HOST") {
            Some(h) => h.parse().map_err(|_| ConfigError::Invalid {
                key: "HOST",
                value: h.clone(),
            })?,
            None => IpAddr::from([127, 0, 0, 1]),
        };

        let manager_badges = lookup("MANAGER_BADGES")
            .map(|raw| {
                raw.split(',')
                    .map(|b| b.trim().to_uppercase())
                    .filter(|b| !b.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host,
            port: parse_or(&lookup, "PORT", 3000)?,
            jwt_secret: required("JWT_SECRET")?,
            manager_badges,
            badge_scan_window_ms: parse_or(&lookup, "BADGE_SCAN_WINDOW_MS", 200)?,
            retention: RetentionPolicy {
                prune_threshold: parse_or(&lookup, "HISTORY_PRUNE_THRESHOLD", 100)?,
                retention_months: parse_or(&lookup, "HISTORY_RETENTION_MONTHS", 12)?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
