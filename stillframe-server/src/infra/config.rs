//! Environment-backed runtime configuration.
//!
//! Everything has a default; only `DATABASE_URL` and the two bearer tokens
//! change what the server can actually do.

use std::fmt;
use std::str::FromStr;

use stillframe_core::recovery::RecoveryConfig;
use stillframe_core::worker::DEFAULT_QUEUE_CAPACITY;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthTokens,
    pub recovery: RecoveryConfig,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Absent: run on the in-memory adapters (nothing survives a restart).
    pub url: Option<String>,
}

/// Static bearer tokens for the two service principals.
#[derive(Clone)]
pub struct AuthTokens {
    pub pipeline_token: Option<String>,
    pub operator_token: Option<String>,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("pipeline_token", &self.pipeline_token.as_ref().map(|_| "<redacted>"))
            .field("operator_token", &self.operator_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("STILLFRAME_HOST", "0.0.0.0"),
                port: parse_env("STILLFRAME_PORT", 8085),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").ok(),
            },
            auth: AuthTokens {
                pipeline_token: std::env::var("STILLFRAME_PIPELINE_TOKEN").ok(),
                operator_token: std::env::var("STILLFRAME_OPERATOR_TOKEN").ok(),
            },
            recovery: RecoveryConfig {
                stale_after_minutes: parse_env("STILLFRAME_STALE_AFTER_MINUTES", 5),
                audit_interval_secs: parse_env("STILLFRAME_AUDIT_INTERVAL_SECS", 300),
            },
            queue_capacity: parse_env("STILLFRAME_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
