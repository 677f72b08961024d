// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use supervisor_rest::api::{self, ApiListener};
use supervisor_rest::settings::{DaemonConfig, Listen};
use supervisor_rest::{BulkMode, ControlApi, LocalSupervisor, ReloadAck, Supervisor};
use tokio::signal::unix::{SignalKind, signal};

/// Flags override the matching `SV_REST_*` environment variables.
#[derive(Parser, Debug, Clone)]
#[command(name = "supervisor-restd")]
#[command(about = "REST control plane for supervised programs")]
struct Args {
    /// TCP address to listen on
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Unix socket to listen on instead of TCP
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Directory holding one YAML file per program
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    /// best-effort or strict
    #[arg(long)]
    bulk_mode: Option<BulkMode>,

    /// reported or legacy
    #[arg(long)]
    reload_ack: Option<ReloadAck>,

    /// Seconds before a supervisor call is abandoned (0 disables)
    #[arg(long)]
    call_timeout: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut DaemonConfig) {
        if let Some(addr) = self.listen {
            config.listen = Listen::Tcp(addr);
        }
        if let Some(path) = self.socket {
            config.listen = Listen::Unix(path);
        }
        if let Some(dir) = self.config_dir {
            config.config_dir = dir;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(mode) = self.bulk_mode {
            config.api.bulk_mode = mode;
        }
        if let Some(ack) = self.reload_ack {
            config.api.reload_ack = ack;
        }
        if let Some(secs) = self.call_timeout {
            config.api.call_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = DaemonConfig::from_env().context("invalid environment configuration")?;
    args.apply(&mut config);
    config.validate()?;

    simple_logger::init_with_level(config.log_level()?)?;
    info!(
        "supervisor-restd starting (version {})",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "bulk mode: {}, reload ack: {}, call timeout: {:?}",
        config.api.bulk_mode, config.api.reload_ack, config.api.call_timeout
    );

    // Bind before spawning anything so a busy address does not orphan children.
    let listener = match &config.listen {
        Listen::Tcp(addr) => ApiListener::bind_tcp(*addr).await?,
        Listen::Unix(path) => ApiListener::bind_unix(path)?,
    };

    let supervisor = Arc::new(LocalSupervisor::from_config_dir(&config.config_dir).await);
    let control = Arc::new(ControlApi::new(supervisor.clone(), config.api.clone()));

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let requested = supervisor.shutdown_requested();
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            () = requested => info!("Supervisor shut down, stopping the API"),
        }
    };

    let result = api::serve(listener, control, shutdown).await;

    // No-op when the shutdown came through the API.
    if let Err(e) = supervisor.shutdown().await {
        warn!("shutdown failed: {e}");
    }
    supervisor.shutdown_requested().await;
    info!("supervisor-restd stopped");

    result
}
