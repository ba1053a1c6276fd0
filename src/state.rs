// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::fingerprint::Fingerprint;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of an idempotent install/build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Changed,
    Unchanged,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        self == Outcome::Changed
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Changed => write!(f, "changed"),
            Outcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Dependencies,
    Build,
}

impl MarkerKind {
    fn file_name(self) -> &'static str {
        match self {
            MarkerKind::Dependencies => "deps.fingerprint",
            MarkerKind::Build => "build.fingerprint",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Dependencies => write!(f, "dependencies"),
            MarkerKind::Build => write!(f, "build"),
        }
    }
}

/// Persists the last-applied fingerprint per step as one small text file
/// each. A missing marker is a normal state (first run, or externally
/// invalidated to force a redo), never an error.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating state directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, kind: MarkerKind) -> Option<Fingerprint> {
        let contents = std::fs::read_to_string(self.marker_path(kind)).ok()?;
        let line = contents.trim();
        if line.is_empty() {
            return None;
        }
        Some(Fingerprint::from_stored(line))
    }

    pub fn save(&self, kind: MarkerKind, fingerprint: &Fingerprint) -> Result<()> {
        let path = self.marker_path(kind);
        std::fs::write(&path, format!("{fingerprint}\n"))
            .with_context(|| format!("writing {kind} marker: {}", path.display()))
    }

    pub fn invalidate(&self, kind: MarkerKind) {
        let _ = std::fs::remove_file(self.marker_path(kind));
    }

    fn marker_path(&self, kind: MarkerKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}
