use std::{env, net::SocketAddr};

use thiserror::Error;

pub const DEFAULT_MAX_REQUEST_BYTES: usize = 32 * 1024;
pub const DEFAULT_BUCKET_CAPACITY: u32 = 50;
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 3_600_000;
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub size_guard: SizeGuardConfig,
    pub rate_limit: RateLimitConfig,
    pub sessions: SessionConfig,
    pub server_name: String,
    pub server_version: String,
    pub methods_file: Option<String>,
    pub resources_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGuardConfig {
    pub enabled: bool,
    pub max_bytes: usize,
}

impl Default for SizeGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub capacity: u32,
    pub refill_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_BUCKET_CAPACITY,
            refill_per_second: f64::from(DEFAULT_BUCKET_CAPACITY),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub timeout_ms: u64,
    pub cleanup_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("{0} must be a non-negative integer")]
    InvalidInteger(&'static str),
    #[error("{0} must be a number")]
    InvalidNumber(&'static str),
    #[error("{0} must be true or false")]
    InvalidBool(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = value("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = value("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);

        let size_guard = SizeGuardConfig {
            enabled: parse_bool(
                "MCP_REQUEST_SIZE_GUARD_ENABLED",
                value("MCP_REQUEST_SIZE_GUARD_ENABLED"),
            )?
            .unwrap_or(true),
            max_bytes: parse_integer("MCP_MAX_REQUEST_BYTES", value("MCP_MAX_REQUEST_BYTES"))?
                .map(|max| {
                    usize::try_from(max)
                        .map_err(|_| ConfigError::InvalidInteger("MCP_MAX_REQUEST_BYTES"))
                })
                .transpose()?
                .unwrap_or(DEFAULT_MAX_REQUEST_BYTES),
        };

        let capacity = parse_integer(
            "MCP_RATE_BUCKET_CAPACITY",
            value("MCP_RATE_BUCKET_CAPACITY"),
        )?
        .map(|capacity| u32::try_from(capacity).unwrap_or(u32::MAX))
        .unwrap_or(DEFAULT_BUCKET_CAPACITY)
        .max(1);
        let refill_per_second = value("MCP_RATE_REFILL_PER_SECOND")
            .map(|value| {
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|rate| rate.is_finite())
                    .ok_or(ConfigError::InvalidNumber("MCP_RATE_REFILL_PER_SECOND"))
            })
            .transpose()?
            .unwrap_or(f64::from(capacity));
        let rate_limit = RateLimitConfig {
            enabled: parse_bool("MCP_RATE_ENABLED", value("MCP_RATE_ENABLED"))?.unwrap_or(true),
            capacity,
            refill_per_second: refill_per_second.max(0.0),
        };

        let sessions = SessionConfig {
            timeout_ms: parse_integer(
                "MCP_UI_SESSION_TIMEOUT_MS",
                value("MCP_UI_SESSION_TIMEOUT_MS"),
            )?
            .filter(|timeout| *timeout > 0)
            .unwrap_or(DEFAULT_SESSION_TIMEOUT_MS),
            cleanup_interval_ms: parse_integer(
                "MCP_UI_SESSION_CLEANUP_INTERVAL_MS",
                value("MCP_UI_SESSION_CLEANUP_INTERVAL_MS"),
            )?
            .filter(|interval| *interval > 0)
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL_MS),
        };

        let config = Self {
            bind_addr,
            bind_port,
            size_guard,
            rate_limit,
            sessions,
            server_name: value("MCP_SERVER_NAME")
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            server_version: value("MCP_SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            methods_file: value("MCP_METHODS_FILE"),
            resources_file: value("MCP_RESOURCES_FILE"),
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn parse_integer(key: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidInteger(key))
        })
        .transpose()
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    value
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::InvalidBool(key)),
        })
        .transpose()
}
