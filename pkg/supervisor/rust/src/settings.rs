// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Daemon settings read from `SV_REST_*` environment variables. Command-line
//! flags are applied on top by the binary.

use crate::api::options::{ApiOptions, BulkMode, ReloadAck};
use crate::config::DEFAULT_CONFIG_DIR;
use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:9001";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_LISTEN: &str = "SV_REST_LISTEN";
pub const ENV_SOCKET: &str = "SV_REST_SOCKET";
pub const ENV_CONFIG_DIR: &str = "SV_REST_CONFIG_DIR";
pub const ENV_LOG_LEVEL: &str = "SV_REST_LOG_LEVEL";
pub const ENV_BULK_MODE: &str = "SV_REST_BULK_MODE";
pub const ENV_RELOAD_ACK: &str = "SV_REST_RELOAD_ACK";
pub const ENV_CALL_TIMEOUT: &str = "SV_REST_CALL_TIMEOUT";

/// Where the API listens. A Unix socket takes precedence over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listen {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for Listen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listen::Tcp(addr) => write!(f, "tcp://{addr}"),
            Listen::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub listen: Listen,
    pub config_dir: PathBuf,
    pub log_level: String,
    pub api: ApiOptions,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: Listen::Tcp(SocketAddr::from(([127, 0, 0, 1], 9001))),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api: ApiOptions::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables. Unset variables keep
    /// their defaults; malformed values are an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = var(ENV_LISTEN) {
            config.listen = Listen::Tcp(parse_listen(&addr).context(ENV_LISTEN)?);
        }
        if let Some(socket) = var(ENV_SOCKET) {
            config.listen = Listen::Unix(PathBuf::from(socket));
        }
        if let Some(dir) = var(ENV_CONFIG_DIR) {
            config.config_dir = PathBuf::from(dir);
        }
        // Priority: SV_REST_LOG_LEVEL > RUST_LOG > default
        if let Some(level) = var(ENV_LOG_LEVEL).or_else(|| var("RUST_LOG")) {
            config.log_level = level;
        }
        if let Some(mode) = var(ENV_BULK_MODE) {
            config.api.bulk_mode = parse_choice::<BulkMode>(&mode).context(ENV_BULK_MODE)?;
        }
        if let Some(ack) = var(ENV_RELOAD_ACK) {
            config.api.reload_ack = parse_choice::<ReloadAck>(&ack).context(ENV_RELOAD_ACK)?;
        }
        if let Some(secs) = var(ENV_CALL_TIMEOUT) {
            config.api.call_timeout = parse_call_timeout(&secs).context(ENV_CALL_TIMEOUT)?;
        }

        Ok(config)
    }

    pub fn log_level(&self) -> Result<log::Level> {
        log::Level::from_str(&self.log_level)
            .map_err(|_| anyhow!("invalid log level '{}'", self.log_level))
    }

    pub fn validate(&self) -> Result<()> {
        self.log_level()?;
        if self.config_dir.as_os_str().is_empty() {
            bail!("config directory must not be empty");
        }
        if let Listen::Unix(path) = &self.listen
            && path.as_os_str().is_empty()
        {
            bail!("socket path must not be empty");
        }
        Ok(())
    }
}

/// Empty values count as unset.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_listen(value: &str) -> Result<SocketAddr> {
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid listen address '{value}': {e}"))
}

fn parse_choice<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|e| anyhow!(e))
}

/// Whole seconds; `0` disables the timeout.
pub fn parse_call_timeout(value: &str) -> Result<Option<Duration>> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid call timeout '{value}': {e}"))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
