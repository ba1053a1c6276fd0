// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::SupervisorConfig;
use crate::errors::BuildError;
use crate::state::{MarkerKind, Outcome, StateStore};
use crate::{exec, fingerprint};
use log::{info, warn};

/// Keeps the build artifact in sync with the source tree, aux config files,
/// and manifest. Idempotent; serving is gated on the artifact it produces.
pub struct Builder<'a> {
    config: &'a SupervisorConfig,
    store: &'a StateStore,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a SupervisorConfig, store: &'a StateStore) -> Self {
        Self { config, store }
    }

    pub async fn ensure(&self) -> Result<Outcome, BuildError> {
        let source_dir = self.config.source_dir_path();
        let current =
            fingerprint::of_tree(source_dir.as_deref(), &self.config.build_aux_paths())?;
        let stored = self.store.load(MarkerKind::Build);
        let build_dir = self.config.build_dir_path();

        // An externally deleted artifact forces a rebuild even when the
        // fingerprint still matches.
        if stored.as_ref() == Some(&current) && build_dir.is_dir() {
            return Ok(Outcome::Unchanged);
        }

        info!("[build] input fingerprint {current}, building");
        exec::run("build", &self.config.build, &self.config.app_dir)
            .await
            .map_err(BuildError::Failed)?;

        // A command may exit zero without producing usable output.
        if !build_dir.is_dir() {
            return Err(BuildError::MissingArtifact(build_dir));
        }

        if let Err(e) = self.store.save(MarkerKind::Build, &current) {
            warn!("[build] failed to persist marker: {e:#}");
        }
        Ok(Outcome::Changed)
    }
}
