// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ProcessConfig;
use serde::{Deserialize, Serialize};

/// Namespace prefix separating program entries from group entries inside the
/// supervisor registry.
pub const PROGRAM_PREFIX: &str = "program:";

/// A program registration request as received by the create endpoint.
///
/// The process settings share their fields with the YAML files under the config
/// directory, so `{"Name": "web", "command": "/usr/bin/web"}` is a valid body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    #[serde(rename = "Name", alias = "name", default)]
    pub name: String,
    #[serde(rename = "Group", alias = "group", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub config: ProcessConfig,
}

impl ProgramDefinition {
    pub fn new(name: impl Into<String>, config: ProcessConfig) -> Self {
        Self {
            name: name.into(),
            group: None,
            config,
        }
    }

    /// Ensure the name carries [`PROGRAM_PREFIX`] exactly once.
    pub fn normalize_name(&mut self) {
        self.name = normalize_program_name(&self.name);
    }

    /// Name without the `program:` namespace.
    pub fn program_name(&self) -> &str {
        strip_program_prefix(&self.name)
    }
}

pub fn normalize_program_name(name: &str) -> String {
    if name.starts_with(PROGRAM_PREFIX) {
        name.to_string()
    } else {
        format!("{PROGRAM_PREFIX}{name}")
    }
}

pub fn strip_program_prefix(name: &str) -> &str {
    name.strip_prefix(PROGRAM_PREFIX).unwrap_or(name)
}
