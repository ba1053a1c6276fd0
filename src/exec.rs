// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::CommandSpec;
use anyhow::{Context, Result, bail};
use log::info;
use std::path::Path;
use tokio::process::Command;

const FAILURE_TAIL_LINES: usize = 20;

/// Run one delegated command to completion, blocking the current tick.
/// Output is captured; on a non-zero exit the tail of stderr/stdout is
/// folded into the error for diagnostics.
pub async fn run(step: &str, spec: &CommandSpec, working_dir: &Path) -> Result<()> {
    info!("[{step}] running {} {:?}", spec.command, spec.args);

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args).current_dir(working_dir);
    for (k, v) in &spec.env {
        cmd.env(k, v);
    }

    let output = cmd
        .output()
        .await
        .with_context(|| format!("[{step}] failed to spawn: {}", spec.command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        bail!(
            "[{step}] {} exited with {}: {}",
            spec.command,
            output.status,
            tail(&detail, FAILURE_TAIL_LINES)
        );
    }

    info!("[{step}] {} completed", spec.command);
    Ok(())
}

/// Last `n` lines of a text blob, newline-joined.
pub fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
