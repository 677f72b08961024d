// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The capability set the control API drives. Implementations own all state;
//! callers only hold an `Arc<dyn Supervisor>`.

use crate::errors::SupervisorError;
use crate::program::ProgramDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Target of a start/stop/revoke call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub name: String,
    /// Block until the state transition completes.
    pub wait: bool,
}

impl ProcessRequest {
    pub fn waiting(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wait: true,
        }
    }

    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wait: false,
        }
    }
}

/// Status of one managed process, in the supervisord wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub group: String,
    pub description: String,
    pub start: i64,
    pub stop: i64,
    pub now: i64,
    pub state: i64,
    pub statename: String,
    pub spawnerr: String,
    pub exitstatus: i64,
    pub logfile: String,
    pub stdout_logfile: String,
    pub stderr_logfile: String,
    pub pid: i64,
}

#[async_trait]
pub trait Supervisor: Send + Sync {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>, SupervisorError>;

    /// Returns the operation's own success flag; `Ok(false)` means the call
    /// went through but the transition did not happen.
    async fn start_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError>;

    async fn stop_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError>;

    async fn create_process(&self, definition: ProgramDefinition)
    -> Result<bool, SupervisorError>;

    /// Stop (if needed) and unregister a program.
    async fn revoke_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError>;

    async fn shutdown(&self) -> Result<bool, SupervisorError>;

    /// Re-read program definitions. A non-incremental reload also drops
    /// programs that are no longer defined.
    async fn reload_config(&self, incremental: bool) -> Result<bool, SupervisorError>;
}
