// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = "/etc/supervisor/programs.d";
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

fn default_true() -> bool {
    true
}

fn default_inherit() -> String {
    "inherit".to_string()
}

/// Process settings shared by the YAML program files and the create endpoint body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default = "default_inherit")]
    pub stdout: String,
    #[serde(default = "default_inherit")]
    pub stderr: String,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_path_exists: Option<String>,
    /// Seconds a child must stay up before a waited start counts as successful.
    #[serde(default)]
    pub start_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<u64>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            description: None,
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            stdout: default_inherit(),
            stderr: default_inherit(),
            auto_start: true,
            condition_path_exists: None,
            start_secs: 0,
            stop_timeout: None,
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            bail!("command must not be empty");
        }
        for (field, value) in [("stdout", &self.stdout), ("stderr", &self.stderr)] {
            if value != "inherit" && value != "null" {
                bail!("{field} must be 'inherit' or 'null', got '{value}'");
            }
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STOP_TIMEOUT)
    }
}

/// Scan a directory for `*.yaml`/`*.yml` files, one program per file.
/// The program name is the file stem. Files that fail to parse or validate are
/// logged and skipped.
pub fn load_configs(dir: &Path) -> Result<Vec<(String, ProcessConfig)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read config directory: {}", dir.display()))?;

    let mut yaml_files: Vec<_> = entries
        .filter_map(|e| match e {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                None
            }
        })
        .filter(|path| {
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if !is_yaml {
                debug!("skipping non-YAML file: {}", path.display());
            }
            is_yaml
        })
        .collect();

    yaml_files.sort();

    let mut configs = Vec::with_capacity(yaml_files.len());
    for path in yaml_files {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("skipping {}: file name is not valid UTF-8", path.display());
            continue;
        };
        match parse_config(&path) {
            Ok(config) => configs.push((name.to_string(), config)),
            Err(e) => warn!("skipping {}: {e:#}", path.display()),
        }
    }

    Ok(configs)
}

fn parse_config(path: &Path) -> Result<ProcessConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: ProcessConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
