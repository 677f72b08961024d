// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::time::Duration;
use thiserror::Error;

/// Failures reported across the [`crate::supervisor::Supervisor`] seam.
///
/// The HTTP layer never surfaces these to clients; they are logged and
/// collapsed into `{"success": false}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("program '{0}' not found")]
    NotFound(String),

    #[error("program '{0}' already exists")]
    AlreadyExists(String),

    #[error("program '{0}' is already running")]
    AlreadyStarted(String),

    #[error("program '{0}' is not running")]
    NotRunning(String),

    #[error("invalid program definition: {0}")]
    InvalidDefinition(String),

    #[error("failed to spawn '{name}': {reason}")]
    Spawn { name: String, reason: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("supervisor call timed out after {0:?}")]
    Timeout(Duration),

    #[error("supervisor is shutting down")]
    ShuttingDown,
}
