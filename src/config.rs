use crate::error::AppError;

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    /// Largest page the call history endpoint returns
    pub history_limit: u32,
    pub gather_timeout_secs: u16,
}

fn var_or<T: FromStr>(name: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name}={raw:?}: {e}"))),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(AppError::Config(format!("{name}: {e}"))),
    }
}

impl Config {
    /// Read configuration from the environment.  Call after `.env` has been loaded.
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL not set".to_string()))?;
        let config = Self {
            database_url,
            bind_addr: var_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 5)?,
            history_limit: var_or("HISTORY_PAGE_LIMIT", 100)?,
            gather_timeout_secs: var_or("GATHER_TIMEOUT_SECS", 5)?,
        };
        if config.history_limit == 0 {
            return Err(AppError::Config("HISTORY_PAGE_LIMIT must be positive".to_string()));
        }

        Ok(config)
    }
}
