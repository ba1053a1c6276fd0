// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use log::info;
use tokio::signal::unix::{Signal, SignalKind, signal};

/// External termination trigger. Resolving `recv` is the only event allowed
/// to end the monitor loop; the supervisor stops the service on the way out.
pub struct ShutdownSignal {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignal {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => info!("received SIGTERM"),
            _ = self.sigint.recv() => info!("received SIGINT"),
        }
    }
}
