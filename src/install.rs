// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::SupervisorConfig;
use crate::errors::InstallError;
use crate::state::{MarkerKind, Outcome, StateStore};
use crate::{exec, fingerprint};
use log::{info, warn};

/// Keeps the dependency tree in sync with the manifest. Idempotent: a
/// matching marker plus an existing tree on disk means nothing to do.
pub struct Installer<'a> {
    config: &'a SupervisorConfig,
    store: &'a StateStore,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a SupervisorConfig, store: &'a StateStore) -> Self {
        Self { config, store }
    }

    pub async fn ensure(&self) -> Result<Outcome, InstallError> {
        let current = fingerprint::of_file(&self.config.manifest_path())?;
        let stored = self.store.load(MarkerKind::Dependencies);
        let deps_dir = self.config.deps_dir_path();

        // The tree can be physically absent with a matching marker (fresh
        // checkout over a stale state dir); existence is always checked.
        if stored.as_ref() == Some(&current) && deps_dir.is_dir() {
            return Ok(Outcome::Unchanged);
        }

        info!("[install] manifest fingerprint {current}, installing dependencies");
        if let Err(first) = exec::run("install", &self.config.install, &self.config.app_dir).await {
            warn!("[install] normal install failed: {first:#}");
            self.hard_reset();
            exec::run("install", &self.config.install, &self.config.app_dir)
                .await
                .map_err(InstallError::Failed)?;
        }

        if let Err(e) = self.store.save(MarkerKind::Dependencies, &current) {
            warn!("[install] failed to persist marker: {e:#}");
        }
        Ok(Outcome::Changed)
    }

    /// Fallback path: wipe the dependency tree and lock artifact so the
    /// retry starts from a clean slate, and drop the marker with them.
    fn hard_reset(&self) {
        let deps_dir = self.config.deps_dir_path();
        info!("[install] hard reset: removing {}", deps_dir.display());
        if let Err(e) = std::fs::remove_dir_all(&deps_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("[install] removing {}: {e}", deps_dir.display());
            }
        }
        if let Some(lockfile) = self.config.lockfile_path() {
            let _ = std::fs::remove_file(&lockfile);
        }
        self.store.invalidate(MarkerKind::Dependencies);
    }
}
