// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How `startPrograms`/`stopPrograms` report per-name outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkMode {
    /// Always `{"success": true}` once every name was attempted.
    #[default]
    BestEffort,
    /// `{"success": <all ok>, "results": [{"name", "success"}, ...]}`.
    Strict,
}

impl FromStr for BulkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(BulkMode::BestEffort),
            "strict" => Ok(BulkMode::Strict),
            other => Err(format!(
                "invalid bulk mode '{other}', expected 'best-effort' or 'strict'"
            )),
        }
    }
}

impl fmt::Display for BulkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkMode::BestEffort => write!(f, "best-effort"),
            BulkMode::Strict => write!(f, "strict"),
        }
    }
}

/// What `/supervisor/reload` puts in `success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadAck {
    /// The supervisor's actual reload outcome.
    #[default]
    Reported,
    /// Always `false`, for clients written against the old behavior.
    Legacy,
}

impl FromStr for ReloadAck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reported" => Ok(ReloadAck::Reported),
            "legacy" => Ok(ReloadAck::Legacy),
            other => Err(format!(
                "invalid reload ack '{other}', expected 'reported' or 'legacy'"
            )),
        }
    }
}

impl fmt::Display for ReloadAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadAck::Reported => write!(f, "reported"),
            ReloadAck::Legacy => write!(f, "legacy"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiOptions {
    pub bulk_mode: BulkMode,
    pub reload_ack: ReloadAck,
    /// Upper bound on a single supervisor call. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}
