// backend/src/config.rs

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::ticketing::TicketingConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub database_max_connections: u32,
    pub ticketing: TicketingConfig,
}

/// Parses `key` if set, otherwise returns `default`. A set but unparsable
/// value is an error rather than a silent fallback.
fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let port = parse_or("PORT", 8080u16)?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let defaults = TicketingConfig::default();
        let ticketing = TicketingConfig {
            base_url: env::var("TICKETING_API_URL").unwrap_or(defaults.base_url),
            api_key: env::var("TICKETING_API_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(parse_or("TICKETING_TIMEOUT_SECS", 30u64)?),
            max_retries: parse_or("TICKETING_MAX_RETRIES", 5u32)?,
            backoff_base: Duration::from_millis(parse_or("TICKETING_BACKOFF_BASE_MS", 500u64)?),
            backoff_max: Duration::from_millis(parse_or("TICKETING_BACKOFF_MAX_MS", 30_000u64)?),
        };
        if ticketing.backoff_base > ticketing.backoff_max {
            return Err(anyhow!("TICKETING_BACKOFF_BASE_MS must not exceed TICKETING_BACKOFF_MAX_MS"));
        }

        Ok(Self { database_url, port, database_max_connections, ticketing })
    }
}
