// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ProcessConfig;
use crate::errors::SupervisorError;
use crate::state::ProcessState;
use crate::supervisor::ProcessInfo;
use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, timeout};

pub const SIGKILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code published by the task that owns the child; `None` while alive.
pub type ExitReceiver = watch::Receiver<Option<i32>>;
pub type ExitSender = watch::Sender<Option<i32>>;

/// Signals for the task that owns the child. They are delivered only while the
/// child is unreaped, so its pid cannot have been recycled.
pub type SignalSender = mpsc::UnboundedSender<Signal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// A freshly spawned child and the channel ends its owning task needs.
pub struct Spawned {
    pub child: Child,
    pub exit_tx: ExitSender,
    pub signals: SignalReceiver,
}

pub struct ManagedProcess {
    pub name: String,
    config: ProcessConfig,
    state: ProcessState,
    pid: Option<u32>,
    started_at: Option<SystemTime>,
    stopped_at: Option<SystemTime>,
    exit_status: Option<i32>,
    spawn_error: Option<String>,
    exit_rx: Option<ExitReceiver>,
    signal_tx: Option<SignalSender>,
}

impl ManagedProcess {
    pub fn new(name: String, config: ProcessConfig) -> Self {
        Self {
            name,
            config,
            state: ProcessState::Stopped,
            pid: None,
            started_at: None,
            stopped_at: None,
            exit_status: None,
            spawn_error: None,
            exit_rx: None,
            signal_tx: None,
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Replace the definition. A running child keeps the old one until restarted.
    pub fn set_config(&mut self, config: ProcessConfig) {
        self.config = config;
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn stop_timeout(&self) -> Duration {
        self.config.stop_timeout()
    }

    pub fn start_secs(&self) -> Duration {
        Duration::from_secs(self.config.start_secs)
    }

    /// Check `auto_start` and `condition_path_exists`.
    pub fn should_start(&self) -> bool {
        if !self.config.auto_start {
            info!("[{}] auto_start=false, skipping", self.name);
            return false;
        }
        if let Some(ref path) = self.config.condition_path_exists
            && !std::path::Path::new(path).exists()
        {
            info!("[{}] condition_path_exists not met: {path}", self.name);
            return false;
        }
        true
    }

    /// Spawn the child. The caller takes ownership of it, drives it with
    /// [`supervise_child`], and publishes its exit code on `exit_tx`.
    pub fn spawn(&mut self) -> Result<Spawned, SupervisorError> {
        if !self.state.can_transition_to(ProcessState::Running) {
            return Err(SupervisorError::AlreadyStarted(self.name.clone()));
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        cmd.envs(&self.config.env);
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(stdio_from_str(&self.config.stdout));
        cmd.stderr(stdio_from_str(&self.config.stderr));

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("[{}] failed to spawn {}: {e}", self.name, self.config.command);
                self.transition(ProcessState::Fatal);
                self.spawn_error = Some(e.to_string());
                return Err(SupervisorError::Spawn {
                    name: self.name.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let (signal_tx, signals) = mpsc::unbounded_channel();
        self.pid = child.id();
        self.started_at = Some(SystemTime::now());
        self.exit_status = None;
        self.spawn_error = None;
        self.exit_rx = Some(exit_rx);
        self.signal_tx = Some(signal_tx);
        self.transition(ProcessState::Running);
        info!(
            "[{}] spawned (pid={}, cmd={})",
            self.name,
            self.pid.unwrap_or(0),
            self.config.command
        );
        Ok(Spawned {
            child,
            exit_tx,
            signals,
        })
    }

    /// Send SIGTERM and move to `Stopping`. Returns false if nothing is running,
    /// including a child that was reaped but whose exit is not recorded yet.
    pub fn begin_stop(&mut self) -> bool {
        if self.state != ProcessState::Running {
            return false;
        }
        info!("[{}] sending SIGTERM", self.name);
        if !self.send_signal(Signal::SIGTERM) {
            return false;
        }
        self.transition(ProcessState::Stopping);
        true
    }

    /// Record the exit of `pid`. Stale notifications from an earlier child are
    /// ignored.
    pub fn record_exit(&mut self, pid: u32, code: Option<i32>) -> bool {
        if self.pid != Some(pid) {
            return false;
        }
        let next = if self.state == ProcessState::Stopping {
            ProcessState::Stopped
        } else {
            ProcessState::Exited
        };
        info!("[{}] exited (pid={pid}, code={code:?})", self.name);
        self.pid = None;
        self.signal_tx = None;
        self.exit_status = code;
        self.stopped_at = Some(SystemTime::now());
        self.transition(next);
        true
    }

    /// Queue `sig` for the child. False once the child has been reaped.
    pub fn send_signal(&self, sig: Signal) -> bool {
        let Some(tx) = &self.signal_tx else {
            return false;
        };
        if tx.send(sig).is_err() {
            debug!("[{}] child already reaped, not sending {sig}", self.name);
            return false;
        }
        true
    }

    pub fn signaller(&self) -> Option<SignalSender> {
        self.signal_tx.clone()
    }

    pub fn exit_receiver(&self) -> Option<ExitReceiver> {
        self.exit_rx.clone()
    }

    pub fn info(&self) -> ProcessInfo {
        let now = SystemTime::now();
        let description = match (&self.config.description, self.state) {
            (Some(desc), _) => desc.clone(),
            (None, ProcessState::Running) => {
                let uptime = self
                    .started_at
                    .and_then(|t| now.duration_since(t).ok())
                    .unwrap_or_default();
                format!("pid {}, uptime {}", self.pid.unwrap_or(0), format_uptime(uptime))
            }
            (None, ProcessState::Stopped) if self.started_at.is_none() => "Not started".to_string(),
            (None, _) => String::new(),
        };

        ProcessInfo {
            name: self.name.clone(),
            group: self.name.clone(),
            description,
            start: self.started_at.map(unix_seconds).unwrap_or(0),
            stop: self.stopped_at.map(unix_seconds).unwrap_or(0),
            now: unix_seconds(now),
            state: self.state.code(),
            statename: self.state.name().to_string(),
            spawnerr: self.spawn_error.clone().unwrap_or_default(),
            exitstatus: self.exit_status.map(i64::from).unwrap_or(0),
            logfile: String::new(),
            stdout_logfile: String::new(),
            stderr_logfile: String::new(),
            pid: self.pid.map(i64::from).unwrap_or(0),
        }
    }

    fn transition(&mut self, next: ProcessState) {
        if !self.state.can_transition_to(next) {
            warn!("[{}] unexpected transition {} -> {next}", self.name, self.state);
        }
        self.state = next;
    }
}

/// Own `child` until it exits, delivering queued signals while it is still
/// unreaped. Returns the exit code, `None` when killed by a signal.
pub async fn supervise_child(
    name: &str,
    mut child: Child,
    mut signals: SignalReceiver,
) -> Option<i32> {
    loop {
        tokio::select! {
            status = child.wait() => {
                return match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        warn!("[{name}] failed to wait on child: {e}");
                        None
                    }
                };
            }
            Some(sig) = signals.recv() => {
                if let Some(pid) = child.id() {
                    send_signal_to(name, pid, sig);
                }
            }
        }
    }
}

fn send_signal_to(name: &str, pid: u32, sig: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        warn!("[{name}] pid {pid} out of range, cannot send {sig}");
        return;
    };
    if let Err(e) = signal::kill(Pid::from_raw(raw), sig) {
        warn!("[{name}] failed to send {sig}: {e}");
    }
}

/// Wait until the exit code is published, or `limit` elapses.
pub async fn wait_for_exit(exit_rx: &mut ExitReceiver, limit: Duration) -> bool {
    // A dropped sender means the owning task is gone; nothing left to wait for.
    timeout(limit, exit_rx.wait_for(Option::is_some)).await.is_ok()
}

/// Wait up to `stop_timeout` for a child that was already sent SIGTERM, then
/// SIGKILL it. Returns whether the child is gone.
pub async fn terminate(
    name: &str,
    signals: SignalSender,
    mut exit_rx: ExitReceiver,
    stop_timeout: Duration,
) -> bool {
    if wait_for_exit(&mut exit_rx, stop_timeout).await {
        return true;
    }
    warn!(
        "[{name}] stop timeout ({}s) reached, sending SIGKILL",
        stop_timeout.as_secs()
    );
    if signals.send(Signal::SIGKILL).is_err() {
        debug!("[{name}] child reaped before SIGKILL");
    }
    if wait_for_exit(&mut exit_rx, SIGKILL_TIMEOUT).await {
        return true;
    }
    warn!("[{name}] still running after SIGKILL, giving up");
    false
}

fn stdio_from_str(s: &str) -> Stdio {
    match s {
        "null" => Stdio::null(),
        _ => Stdio::inherit(),
    }
}

fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
