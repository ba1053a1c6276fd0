// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/etc/buildservd/buildservd.yaml";
pub const DEFAULT_INTERVAL_SECS: u64 = 15;
const INTERVAL_ENV: &str = "BUILDSERVD_INTERVAL";

fn default_manifest() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_deps_dir() -> PathBuf {
    PathBuf::from("node_modules")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".buildservd")
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// One delegated external command (install, build, or serve).
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Supervisor configuration, one YAML file per supervised application.
/// All relative paths resolve against `app_dir`.
#[derive(Debug, Deserialize)]
pub struct SupervisorConfig {
    pub app_dir: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub extra_files: Vec<PathBuf>,
    #[serde(default = "default_deps_dir")]
    pub deps_dir: PathBuf,
    pub lockfile: Option<PathBuf>,
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    pub install: CommandSpec,
    pub build: CommandSpec,
    pub serve: CommandSpec,
    pub port: u16,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    pub service_log: Option<PathBuf>,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl SupervisorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: SupervisorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_dir.join(path)
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest)
    }

    pub fn source_dir_path(&self) -> Option<PathBuf> {
        self.source_dir.as_deref().map(|p| self.resolve(p))
    }

    /// Aux inputs to the build fingerprint: declared extra files plus the
    /// manifest, so a dependency bump also forces a rebuild.
    pub fn build_aux_paths(&self) -> Vec<PathBuf> {
        let mut aux: Vec<PathBuf> = self.extra_files.iter().map(|p| self.resolve(p)).collect();
        aux.push(self.manifest_path());
        aux
    }

    pub fn deps_dir_path(&self) -> PathBuf {
        self.resolve(&self.deps_dir)
    }

    pub fn lockfile_path(&self) -> Option<PathBuf> {
        self.lockfile.as_deref().map(|p| self.resolve(p))
    }

    pub fn build_dir_path(&self) -> PathBuf {
        self.resolve(&self.build_dir)
    }

    pub fn state_dir_path(&self) -> PathBuf {
        self.resolve(&self.state_dir)
    }

    pub fn service_log_path(&self) -> PathBuf {
        match self.service_log.as_deref() {
            Some(p) => self.resolve(p),
            None => self.state_dir_path().join("service.log"),
        }
    }

    pub fn handle_path(&self) -> PathBuf {
        self.state_dir_path().join("service.pgid")
    }

    /// Tick interval: `BUILDSERVD_INTERVAL` overrides the config value;
    /// empty or non-numeric values fall back with a warning.
    pub fn interval_secs(&self) -> u64 {
        match std::env::var(INTERVAL_ENV) {
            Ok(raw) => sanitize_interval(&raw, self.interval_secs),
            Err(_) => self.interval_secs,
        }
    }
}

fn sanitize_interval(raw: &str, fallback: u64) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            warn!("invalid {INTERVAL_ENV} value {raw:?}, using {fallback}s");
            fallback
        }
    }
}

/// Config file location: `BUILDSERVD_CONFIG` or the packaged default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BUILDSERVD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
