// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Production [`Supervisor`]: spawns the configured programs as child
//! processes of this daemon.

use crate::config::{ProcessConfig, load_configs};
use crate::errors::SupervisorError;
use crate::process::{
    ExitReceiver, ManagedProcess, SignalSender, Spawned, supervise_child, terminate, wait_for_exit,
};
use crate::program::{PROGRAM_PREFIX, ProgramDefinition, strip_program_prefix};
use crate::supervisor::{ProcessInfo, ProcessRequest, Supervisor};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

type ProcessTable = Arc<RwLock<BTreeMap<String, ManagedProcess>>>;

/// Outcome of applying a set of program definitions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

pub struct LocalSupervisor {
    programs: ProcessTable,
    config_dir: Option<PathBuf>,
    shutting_down: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl LocalSupervisor {
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            programs: Arc::new(RwLock::new(BTreeMap::new())),
            config_dir,
            shutting_down: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Load every program file under `dir` and start the auto-start ones.
    /// A missing directory yields an empty supervisor.
    pub async fn from_config_dir(dir: &Path) -> Self {
        let supervisor = Self::new(Some(dir.to_path_buf()));
        if !dir.exists() {
            warn!("config directory {} does not exist", dir.display());
            return supervisor;
        }
        match load_configs(dir) {
            Ok(configs) => {
                info!("loaded {} program config(s)", configs.len());
                supervisor.apply_configs(configs, false).await;
            }
            Err(e) => warn!("{e:#}"),
        }
        supervisor
    }

    /// Resolves once a shutdown was requested through [`Supervisor::shutdown`]
    /// and every child has been stopped.
    pub fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_tx.subscribe();
        async move {
            // An error means the supervisor was dropped; treat it as shutdown.
            let _ = rx.wait_for(|done| *done).await;
        }
    }

    /// Register `configs` and start the new auto-start programs. With `prune`,
    /// programs missing from `configs` are stopped and removed.
    pub async fn apply_configs(
        &self,
        configs: Vec<(String, ProcessConfig)>,
        prune: bool,
    ) -> ReloadSummary {
        let mut summary = ReloadSummary::default();
        let mut programs = self.programs.write().await;

        if prune {
            let wanted: Vec<&str> = configs.iter().map(|(name, _)| name.as_str()).collect();
            let stale: Vec<String> = programs
                .keys()
                .filter(|name| !wanted.contains(&name.as_str()))
                .cloned()
                .collect();
            for name in stale {
                if let Some(mut proc) = programs.remove(&name) {
                    stop_detached(&mut proc);
                }
                summary.removed.push(name);
            }
        }

        for (name, config) in configs {
            match programs.get_mut(&name) {
                Some(proc) if proc.config() == &config => {}
                Some(proc) => {
                    info!("[{name}] definition changed, applied on next start");
                    proc.set_config(config);
                    summary.changed.push(name);
                }
                None => {
                    let mut proc = ManagedProcess::new(name.clone(), config);
                    if proc.should_start()
                        && let Err(e) = self.spawn_watched(&mut proc)
                    {
                        warn!("{e}");
                    }
                    programs.insert(name.clone(), proc);
                    summary.added.push(name);
                }
            }
        }

        summary
    }

    /// Stop every running child, waiting for each one in turn.
    pub async fn stop_all(&self) {
        stop_programs(&self.programs).await;
    }

    /// Callers hold the table write lock, so a shutdown that already started
    /// collecting stop handles never misses the child spawned here.
    fn spawn_watched(&self, proc: &mut ManagedProcess) -> Result<(), SupervisorError> {
        self.ensure_accepting()?;
        let spawned = proc.spawn()?;
        watch_child(self.programs.clone(), proc.name.clone(), spawned);
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<(), SupervisorError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SupervisorError::ShuttingDown);
        }
        Ok(())
    }
}

/// Hand the child to a task that delivers its signals and reaps it, then
/// records the exit in the table and publishes the exit code.
fn watch_child(programs: ProcessTable, name: String, spawned: Spawned) {
    let Spawned {
        child,
        exit_tx,
        signals,
    } = spawned;
    let Some(pid) = child.id() else {
        warn!("[{name}] child exited before it could be watched");
        let _ = exit_tx.send(Some(-1));
        return;
    };
    tokio::spawn(async move {
        let code = supervise_child(&name, child, signals).await;
        if let Some(proc) = programs.write().await.get_mut(&name) {
            proc.record_exit(pid, code);
        }
        let _ = exit_tx.send(Some(code.unwrap_or(-1)));
    });
}

type StopHandle = (String, SignalSender, ExitReceiver, Duration);

/// SIGTERM every running child first, then wait for each in turn.
async fn stop_programs(programs: &ProcessTable) {
    let pending: Vec<StopHandle> = {
        let mut programs = programs.write().await;
        programs.values_mut().filter_map(stop_handle).collect()
    };
    for (name, signals, exit_rx, stop_timeout) in pending {
        terminate(&name, signals, exit_rx, stop_timeout).await;
    }
}

/// SIGTERM the child and return what a waiter needs to finish the stop.
fn stop_handle(proc: &mut ManagedProcess) -> Option<StopHandle> {
    let signals = proc.signaller()?;
    let exit_rx = proc.exit_receiver()?;
    if exit_rx.borrow().is_some() || !proc.begin_stop() {
        return None;
    }
    Some((proc.name.clone(), signals, exit_rx, proc.stop_timeout()))
}

/// SIGTERM the child and escalate in the background.
fn stop_detached(proc: &mut ManagedProcess) {
    if let Some((name, signals, exit_rx, stop_timeout)) = stop_handle(proc) {
        tokio::spawn(async move {
            terminate(&name, signals, exit_rx, stop_timeout).await;
        });
    }
}

/// Table key for a request name; `program:web` and `web` address the same entry.
fn program_key(name: &str) -> &str {
    strip_program_prefix(name)
}

#[async_trait]
impl Supervisor for LocalSupervisor {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>, SupervisorError> {
        let programs = self.programs.read().await;
        Ok(programs.values().map(ManagedProcess::info).collect())
    }

    async fn start_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError> {
        self.ensure_accepting()?;
        let key = program_key(&request.name);
        let (mut exit_rx, start_secs) = {
            let mut programs = self.programs.write().await;
            let proc = programs
                .get_mut(key)
                .ok_or_else(|| SupervisorError::NotFound(request.name.clone()))?;
            if proc.state().is_alive() {
                return Err(SupervisorError::AlreadyStarted(request.name.clone()));
            }
            self.spawn_watched(proc)?;
            let exit_rx = proc
                .exit_receiver()
                .ok_or_else(|| SupervisorError::NotRunning(request.name.clone()))?;
            (exit_rx, proc.start_secs())
        };

        if !request.wait || start_secs.is_zero() {
            return Ok(true);
        }

        // A child that dies inside its start window did not start.
        if wait_for_exit(&mut exit_rx, start_secs).await {
            warn!("[{key}] exited within {}s of starting", start_secs.as_secs());
            return Ok(false);
        }
        Ok(true)
    }

    async fn stop_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError> {
        let key = program_key(&request.name);
        let handle = {
            let mut programs = self.programs.write().await;
            let proc = programs
                .get_mut(key)
                .ok_or_else(|| SupervisorError::NotFound(request.name.clone()))?;
            stop_handle(proc).ok_or_else(|| SupervisorError::NotRunning(request.name.clone()))?
        };

        let (name, signals, exit_rx, stop_timeout) = handle;
        if request.wait {
            return Ok(terminate(&name, signals, exit_rx, stop_timeout).await);
        }
        tokio::spawn(async move {
            terminate(&name, signals, exit_rx, stop_timeout).await;
        });
        Ok(true)
    }

    async fn create_process(
        &self,
        definition: ProgramDefinition,
    ) -> Result<bool, SupervisorError> {
        self.ensure_accepting()?;
        if definition.group.is_some() || !definition.name.starts_with(PROGRAM_PREFIX) {
            return Err(SupervisorError::Unsupported(format!(
                "only '{PROGRAM_PREFIX}' entries can be created, got '{}'",
                definition.name
            )));
        }
        let name = definition.program_name().to_string();
        if name.is_empty() {
            return Err(SupervisorError::InvalidDefinition(
                "program name must not be empty".to_string(),
            ));
        }
        definition
            .config
            .validate()
            .map_err(|e| SupervisorError::InvalidDefinition(format!("{e:#}")))?;

        let mut programs = self.programs.write().await;
        // Shutdown may have begun while this call waited for the lock.
        self.ensure_accepting()?;
        if programs.contains_key(&name) {
            return Err(SupervisorError::AlreadyExists(name));
        }

        let mut proc = ManagedProcess::new(name.clone(), definition.config);
        let started = if proc.should_start() {
            self.spawn_watched(&mut proc).is_ok()
        } else {
            true
        };
        info!("[{name}] created");
        programs.insert(name, proc);
        Ok(started)
    }

    async fn revoke_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError> {
        let key = program_key(&request.name);
        let handle = {
            let mut programs = self.programs.write().await;
            let mut proc = programs
                .remove(key)
                .ok_or_else(|| SupervisorError::NotFound(request.name.clone()))?;
            info!("[{key}] revoked");
            stop_handle(&mut proc)
        };

        let Some((name, signals, exit_rx, stop_timeout)) = handle else {
            return Ok(true);
        };
        if request.wait {
            return Ok(terminate(&name, signals, exit_rx, stop_timeout).await);
        }
        tokio::spawn(async move {
            terminate(&name, signals, exit_rx, stop_timeout).await;
        });
        Ok(true)
    }

    async fn shutdown(&self) -> Result<bool, SupervisorError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("shutdown already in progress");
            return Ok(true);
        }
        info!("shutdown requested, stopping all programs");

        let programs = self.programs.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            stop_programs(&programs).await;
            info!("all programs stopped");
            shutdown_tx.send_replace(true);
        });
        Ok(true)
    }

    async fn reload_config(&self, incremental: bool) -> Result<bool, SupervisorError> {
        self.ensure_accepting()?;
        let dir = self
            .config_dir
            .as_deref()
            .ok_or_else(|| SupervisorError::Config("no config directory configured".to_string()))?;
        let configs = load_configs(dir).map_err(|e| SupervisorError::Config(format!("{e:#}")))?;
        let summary = self.apply_configs(configs, !incremental).await;
        info!(
            "reloaded {}: added={:?} changed={:?} removed={:?}",
            dir.display(),
            summary.added,
            summary.changed,
            summary.removed
        );
        Ok(true)
    }
}
