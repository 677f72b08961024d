// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

/// Lifecycle of one supervised program. Numeric codes follow supervisord so
/// that existing dashboards can read `state` from the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Registered, never started or stopped on request.
    Stopped,
    /// Child process is alive.
    Running,
    /// SIGTERM sent, waiting for the child to exit.
    Stopping,
    /// Exited on its own.
    Exited,
    /// Could not be spawned.
    Fatal,
}

impl ProcessState {
    pub fn is_alive(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Stopping)
    }

    pub fn code(self) -> i64 {
        match self {
            ProcessState::Stopped => 0,
            ProcessState::Running => 20,
            ProcessState::Stopping => 40,
            ProcessState::Exited => 100,
            ProcessState::Fatal => 200,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessState::Stopped => "STOPPED",
            ProcessState::Running => "RUNNING",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Exited => "EXITED",
            ProcessState::Fatal => "FATAL",
        }
    }

    pub(crate) fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Stopped | Exited | Fatal, Running)
                | (Stopped | Exited | Fatal, Fatal)
                | (Running, Stopping)
                | (Running, Exited)
                | (Stopping, Stopped)
                | (Stopping, Exited)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_lowercase())
    }
}
