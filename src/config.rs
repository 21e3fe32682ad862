//! Environment-sourced defaults. Anything the CLI doesn't set explicitly
//! falls back to these, which in turn fall back to the wire-protocol
//! defaults in [`crate::consts`].

use crate::consts::{DEFAULT_BAUD, DEFAULT_BUFFER_SIZE, DEFAULT_PASSWORD, DEFAULT_USER};

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub buffer_size: usize,
    pub baud: u32,
    pub port: Option<String>,
    pub user: String,
    pub password: String,
}

impl Config {
    /// Build from `RSHELL_*` environment variables, falling back to the
    /// protocol defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            buffer_size: env_usize("RSHELL_BUFFER_SIZE", DEFAULT_BUFFER_SIZE),
            baud: env_u32("RSHELL_BAUD", DEFAULT_BAUD),
            port: std::env::var("RSHELL_PORT").ok(),
            user: std::env::var("RSHELL_USER").unwrap_or_else(|_| DEFAULT_USER.to_string()),
            password: std::env::var("RSHELL_PASSWORD").unwrap_or_else(|_| DEFAULT_PASSWORD.to_string()),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
