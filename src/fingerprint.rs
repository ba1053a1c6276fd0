// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::FingerprintError;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Sentinel for a declared single file that does not exist.
pub const ABSENT: &str = "absent";
/// Sentinel for a composite input set with nothing to digest.
pub const NONE: &str = "none";

/// Opaque content fingerprint used purely for change detection.
/// Real digests are blake3 hex; `absent` and `none` are legitimate,
/// comparable sentinel values distinct from any digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn absent() -> Self {
        Fingerprint(ABSENT.to_string())
    }

    pub fn none() -> Self {
        Fingerprint(NONE.to_string())
    }

    /// Rehydrate a fingerprint persisted by the state store.
    pub fn from_stored(s: &str) -> Self {
        Fingerprint(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a single file's bytes. A missing file yields the `absent`
/// sentinel; any other I/O failure propagates.
pub fn of_file(path: &Path) -> Result<Fingerprint, FingerprintError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&bytes);
            Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Fingerprint::absent()),
        Err(e) => Err(FingerprintError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Fingerprint a source tree plus auxiliary files.
///
/// Regular files under `root` are enumerated in path-sorted order and each
/// file's relative path and content digest are folded into an outer hasher,
/// followed by each aux file that exists. An empty input set degenerates to
/// the `none` sentinel. The result depends only on the set of files and
/// their bytes, never on filesystem enumeration order.
pub fn of_tree(root: Option<&Path>, aux: &[PathBuf]) -> Result<Fingerprint, FingerprintError> {
    let mut entries: Vec<(String, Fingerprint)> = Vec::new();

    if let Some(root) = root {
        if root.is_dir() {
            let mut files: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(root) {
                let entry = entry.map_err(|e| FingerprintError::Walk {
                    path: root.to_path_buf(),
                    source: e,
                })?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            for file in files {
                let rel = file
                    .strip_prefix(root)
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .into_owned();
                entries.push((rel, digest_file(&file)?));
            }
        }
    }

    for path in aux {
        if path.exists() {
            let name = path.to_string_lossy().into_owned();
            entries.push((name, digest_file(path)?));
        }
    }

    if entries.is_empty() {
        return Ok(Fingerprint::none());
    }

    let mut hasher = blake3::Hasher::new();
    for (name, digest) in &entries {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(digest.as_str().as_bytes());
        hasher.update(b"\n");
    }
    Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
}

fn digest_file(path: &Path) -> Result<Fingerprint, FingerprintError> {
    let bytes = std::fs::read(path).map_err(|e| FingerprintError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(&bytes);
    Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
}
