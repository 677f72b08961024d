// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! REST control plane over a process supervisor.
//!
//! The HTTP layer in [`api`] only ever talks to an `Arc<dyn Supervisor>`;
//! [`local::LocalSupervisor`] is the production implementation and
//! `memory::InMemorySupervisor` (behind the `test-helpers` feature) is the
//! recording double used by the integration tests.

pub mod api;
pub mod config;
pub mod errors;
pub mod local;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod process;
pub mod program;
pub mod settings;
pub mod state;
pub mod supervisor;

pub use api::{ApiOptions, BulkMode, ControlApi, ReloadAck};
pub use errors::SupervisorError;
pub use local::LocalSupervisor;
pub use program::ProgramDefinition;
pub use supervisor::{ProcessInfo, ProcessRequest, Supervisor};
