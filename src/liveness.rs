// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::service::{ProcessOps, ServiceHandle};

/// Ordered fallback liveness chain: process-group membership, then
/// listening-port, then direct PID check. A later probe is consulted only
/// when the earlier one was inconclusive (`None`); a conclusive answer,
/// true or false, ends the chain. All-inconclusive reads as dead.
///
/// No single signal is reliable everywhere: a dead leader with live
/// children still reads alive through the group, and a re-parented process
/// still reads alive through its bound port.
pub fn is_alive(handle: ServiceHandle, port: u16, ops: &dyn ProcessOps) -> bool {
    if let Some(alive) = ops.group_alive(handle.pgid) {
        return alive;
    }
    if let Some(open) = ops.port_open(port) {
        return open;
    }
    if let Some(alive) = ops.pid_alive(handle.pid) {
        return alive;
    }
    false
}
