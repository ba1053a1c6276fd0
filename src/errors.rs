// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use thiserror::Error;

/// I/O failure while fingerprinting, distinct from "file absent" (which is a
/// sentinel fingerprint, not an error).
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("walking {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
    /// Both the normal install and the post-reset retry failed.
    #[error("install failed after hard reset retry: {0:#}")]
    Failed(anyhow::Error),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
    #[error("build command failed: {0:#}")]
    Failed(anyhow::Error),
    /// The build command exited zero but produced no artifact directory.
    #[error("build reported success but artifact directory {0} is missing")]
    MissingArtifact(PathBuf),
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("failed to spawn serve command: {0:#}")]
    Spawn(anyhow::Error),
    /// All post-launch checks (launcher, group, port) came back dead.
    #[error("service did not survive the startup grace period")]
    DiedEarly,
}
