use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

pub mod cors;

pub use cors::create_cors_layer;

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "events";
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_POOL_MIN: u32 = 0;
const DEFAULT_POOL_MAX: u32 = 10;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_PORT: u16 = 3000;

static RUN_MODE: OnceLock<RunMode> = OnceLock::new();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("DB_POOL_MIN ({min}) cannot exceed DB_POOL_MAX ({max})")]
    PoolBounds { min: u32, max: u32 },
}

/// Whether internal error details may be returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl RunMode {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("development") => RunMode::Development,
            _ => RunMode::Production,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(env::var("NODE_ENV").ok().as_deref())
    }

    /// Fixes the process-wide mode. Has no effect once the mode was read.
    pub fn install(self) {
        let _ = RUN_MODE.set(self);
    }

    /// Process-wide mode; falls back to the environment if never installed.
    pub fn current() -> Self {
        *RUN_MODE.get_or_init(Self::from_env)
    }

    pub fn is_development(self) -> bool {
        self == RunMode::Development
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub port: u16,
    pub mode: RunMode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let pool_min = parse_or(&lookup, "DB_POOL_MIN", "non-negative integer", DEFAULT_POOL_MIN)?;
        let pool_max = parse_or(&lookup, "DB_POOL_MAX", "non-negative integer", DEFAULT_POOL_MAX)?;
        if pool_min > pool_max {
            return Err(ConfigError::PoolBounds {
                min: pool_min,
                max: pool_max,
            });
        }

        let idle_ms = parse_or(&lookup, "DB_IDLE_TIMEOUT_MS", "duration in ms", DEFAULT_IDLE_TIMEOUT_MS)?;
        let connect_ms = parse_or(
            &lookup,
            "DB_CONNECT_TIMEOUT_MS",
            "duration in ms",
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?;

        let database = DatabaseConfig {
            host: text("DB_HOST", DEFAULT_DB_HOST),
            port: parse_or(&lookup, "DB_PORT", "port number", DEFAULT_DB_PORT)?,
            name: text("DB_NAME", DEFAULT_DB_NAME),
            user: text("DB_USER", DEFAULT_DB_USER),
            password: text("DB_PASSWORD", ""),
            pool_min,
            pool_max,
            idle_timeout: Duration::from_millis(idle_ms),
            connect_timeout: Duration::from_millis(connect_ms),
        };

        Ok(Self {
            database,
            port: parse_or(&lookup, "PORT", "port number", DEFAULT_PORT)?,
            mode: RunMode::parse(lookup("NODE_ENV").as_deref()),
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name,
            expected,
            value: raw,
        }),
    }
}
