// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory [`Supervisor`] that records every call. No processes are
//! spawned; program state is a table of [`ProcessInfo`] rows.

use crate::errors::SupervisorError;
use crate::program::{ProgramDefinition, strip_program_prefix};
use crate::state::ProcessState;
use crate::supervisor::{ProcessInfo, ProcessRequest, Supervisor};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

/// One invocation received by [`InMemorySupervisor`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Start(ProcessRequest),
    Stop(ProcessRequest),
    Create(ProgramDefinition),
    Revoke(ProcessRequest),
    Shutdown,
    Reload { incremental: bool },
}

#[derive(Default)]
struct Inner {
    programs: BTreeMap<String, ProcessInfo>,
    calls: Vec<Call>,
    failing: BTreeSet<String>,
    declined: BTreeSet<String>,
    hanging: BTreeSet<String>,
    fail_list: bool,
    reload_ack: bool,
    shutdown_ack: bool,
}

#[derive(Default)]
pub struct InMemorySupervisor {
    inner: Mutex<Inner>,
}

impl InMemorySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a program in the given state.
    pub fn with_program(mut self, name: &str, state: ProcessState) -> Self {
        let key = strip_program_prefix(name).to_string();
        self.inner.get_mut().programs.insert(key.clone(), row(&key, state));
        self
    }

    /// Calls naming `name` return an error.
    pub fn with_failing(mut self, name: &str) -> Self {
        self.inner.get_mut().failing.insert(name.to_string());
        self
    }

    /// Calls naming `name` go through but report `Ok(false)`.
    pub fn with_declined(mut self, name: &str) -> Self {
        self.inner.get_mut().declined.insert(name.to_string());
        self
    }

    /// Calls naming `name` never complete.
    pub fn with_hanging(mut self, name: &str) -> Self {
        self.inner.get_mut().hanging.insert(name.to_string());
        self
    }

    pub fn with_failing_list(mut self) -> Self {
        self.inner.get_mut().fail_list = true;
        self
    }

    pub fn with_reload_ack(mut self, ack: bool) -> Self {
        self.inner.get_mut().reload_ack = ack;
        self
    }

    pub fn with_shutdown_ack(mut self, ack: bool) -> Self {
        self.inner.get_mut().shutdown_ack = ack;
        self
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.inner.lock().await.calls.clone()
    }

    /// Definitions received by `create_process`, as forwarded by the caller.
    pub async fn created(&self) -> Vec<ProgramDefinition> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(definition) => Some(definition),
                _ => None,
            })
            .collect()
    }

    pub async fn state_of(&self, name: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .programs
            .get(strip_program_prefix(name))
            .map(|info| info.statename.clone())
    }

    /// Record `call` and apply the per-name fault injection. Returns `Ok(true)`
    /// when the caller should carry out the transition.
    async fn admit(&self, name: &str, call: Call) -> Result<bool, SupervisorError> {
        let hang = {
            let mut inner = self.inner.lock().await;
            inner.calls.push(call);
            if inner.failing.contains(name) {
                return Err(SupervisorError::Spawn {
                    name: name.to_string(),
                    reason: "injected failure".to_string(),
                });
            }
            if inner.declined.contains(name) {
                return Ok(false);
            }
            inner.hanging.contains(name)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(true)
    }

    async fn transition(
        &self,
        name: &str,
        from_alive: bool,
        next: ProcessState,
    ) -> Result<bool, SupervisorError> {
        let mut inner = self.inner.lock().await;
        let info = inner
            .programs
            .get_mut(strip_program_prefix(name))
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        let alive = info.statename == ProcessState::Running.name();
        match (alive, from_alive) {
            (true, false) => Err(SupervisorError::AlreadyStarted(name.to_string())),
            (false, true) => Err(SupervisorError::NotRunning(name.to_string())),
            _ => {
                info.state = next.code();
                info.statename = next.name().to_string();
                Ok(true)
            }
        }
    }
}

fn row(name: &str, state: ProcessState) -> ProcessInfo {
    ProcessInfo {
        name: name.to_string(),
        group: name.to_string(),
        state: state.code(),
        statename: state.name().to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl Supervisor for InMemorySupervisor {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>, SupervisorError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(Call::List);
        if inner.fail_list {
            return Err(SupervisorError::Config("injected list failure".to_string()));
        }
        Ok(inner.programs.values().cloned().collect())
    }

    async fn start_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError> {
        let name = request.name.clone();
        if !self.admit(&name, Call::Start(request)).await? {
            return Ok(false);
        }
        self.transition(&name, false, ProcessState::Running).await
    }

    async fn stop_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError> {
        let name = request.name.clone();
        if !self.admit(&name, Call::Stop(request)).await? {
            return Ok(false);
        }
        self.transition(&name, true, ProcessState::Stopped).await
    }

    async fn create_process(
        &self,
        definition: ProgramDefinition,
    ) -> Result<bool, SupervisorError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(Call::Create(definition.clone()));
        if definition.group.is_some() {
            return Err(SupervisorError::Unsupported(
                "group definitions are not supported".to_string(),
            ));
        }
        let key = definition.program_name().to_string();
        if inner.failing.contains(&key) {
            return Err(SupervisorError::InvalidDefinition(key));
        }
        if inner.programs.contains_key(&key) {
            return Err(SupervisorError::AlreadyExists(key));
        }
        inner
            .programs
            .insert(key.clone(), row(&key, ProcessState::Stopped));
        Ok(true)
    }

    async fn revoke_process(&self, request: ProcessRequest) -> Result<bool, SupervisorError> {
        let name = request.name.clone();
        if !self.admit(&name, Call::Revoke(request)).await? {
            return Ok(false);
        }
        let mut inner = self.inner.lock().await;
        inner
            .programs
            .remove(strip_program_prefix(&name))
            .map(|_| true)
            .ok_or(SupervisorError::NotFound(name))
    }

    async fn shutdown(&self) -> Result<bool, SupervisorError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(Call::Shutdown);
        Ok(inner.shutdown_ack)
    }

    async fn reload_config(&self, incremental: bool) -> Result<bool, SupervisorError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(Call::Reload { incremental });
        Ok(inner.reload_ack)
    }
}
