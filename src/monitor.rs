// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::builder::Builder;
use crate::config::SupervisorConfig;
use crate::install::Installer;
use crate::liveness;
use crate::service::{ProcessOps, ServiceHandle, ServiceManager, UnixOps};
use crate::shutdown::ShutdownSignal;
use crate::state::StateStore;
use anyhow::Result;
use log::{error, info, warn};
use tokio::time::{Duration, sleep};

const LOG_TAIL_LINES: usize = 20;

/// Top-level control loop. Owns the single "current handle" slot; no other
/// component mutates it. One tick runs liveness, install, build, and any
/// resulting restart strictly sequentially, then the loop sleeps.
pub struct Supervisor {
    config: SupervisorConfig,
    store: StateStore,
    manager: ServiceManager,
    ops: Box<dyn ProcessOps + Send + Sync>,
    handle: Option<ServiceHandle>,
    interval: Duration,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, interval: Duration) -> Result<Self> {
        let store = StateStore::new(&config.state_dir_path())?;
        let manager = ServiceManager::new(&config);
        // A handle may survive from a previous supervisor run in the same
        // container; it is adopted here and probed like any other.
        let handle = ServiceHandle::load(manager.handle_path());
        if let Some(h) = handle {
            info!("[monitor] recovered handle (pid={}, pgid={})", h.pid, h.pgid);
        }
        Ok(Self {
            config,
            store,
            manager,
            ops: Box::new(UnixOps),
            handle,
            interval,
        })
    }

    pub fn current_handle(&self) -> Option<ServiceHandle> {
        self.handle
    }

    /// Run until an external termination signal, then stop the service.
    pub async fn run(&mut self) -> Result<()> {
        let mut shutdown = ShutdownSignal::new()?;
        tokio::select! {
            _ = shutdown.recv() => {}
            _ = self.supervise() => {}
        }
        self.shutdown().await;
        Ok(())
    }

    async fn supervise(&mut self) {
        self.startup().await;
        loop {
            sleep(self.interval).await;
            self.tick().await;
        }
    }

    /// One install+build+start pass before the interval-driven loop.
    pub async fn startup(&mut self) {
        info!(
            "[monitor] supervising {} (port {}, interval {}s)",
            self.config.app_dir.display(),
            self.config.port,
            self.interval.as_secs()
        );
        self.sync_inputs().await;
        self.reprobe_handle();
        if self.handle.is_none() {
            self.try_start().await;
        }
    }

    /// One monitor cycle: restart on death, re-sync inputs, restart on change.
    pub async fn tick(&mut self) {
        self.reprobe_handle();
        match self.handle {
            Some(_) => {}
            // An externally-bound service on our port means something else
            // is already serving; do not fight it.
            None if self.ops.port_open(self.config.port) == Some(true) => {
                info!("[monitor] port {} already bound, not starting", self.config.port);
            }
            None => self.try_start().await,
        }

        // A change always forces a fresh instance, alive or not.
        if self.sync_inputs().await {
            info!("[monitor] inputs changed, cycling service");
            if let Some(h) = self.handle.take() {
                self.manager.stop(h, self.ops.as_ref()).await;
            }
            self.try_start().await;
        }
    }

    pub async fn shutdown(&mut self) {
        if let Some(h) = self.handle.take() {
            info!("[monitor] shutting down, stopping service group {}", h.pgid);
            self.manager.stop(h, self.ops.as_ref()).await;
        }
    }

    /// Clear the handle slot if the recorded service is no longer alive.
    fn reprobe_handle(&mut self) {
        if let Some(h) = self.handle {
            if !liveness::is_alive(h, self.config.port, self.ops.as_ref()) {
                warn!(
                    "[monitor] service died (pid={}); last output:\n{}",
                    h.pid,
                    self.manager.log_tail(LOG_TAIL_LINES)
                );
                ServiceHandle::remove(self.manager.handle_path());
                self.handle = None;
            }
        }
    }

    /// Run Installer then Builder; either `Changed` report makes this true.
    /// Step failures are logged and swallowed so the loop always reaches its
    /// next tick.
    async fn sync_inputs(&mut self) -> bool {
        let mut changed = false;

        match Installer::new(&self.config, &self.store).ensure().await {
            Ok(outcome) => changed |= outcome.is_changed(),
            Err(e) => error!("[monitor] install step failed: {e}"),
        }

        match Builder::new(&self.config, &self.store).ensure().await {
            Ok(outcome) => changed |= outcome.is_changed(),
            Err(e) => error!("[monitor] build step failed: {e}"),
        }

        changed
    }

    async fn try_start(&mut self) {
        let build_dir = self.config.build_dir_path();
        if !build_dir.is_dir() {
            warn!(
                "[monitor] no build artifact at {}, holding off start until a build succeeds",
                build_dir.display()
            );
            return;
        }
        match self.manager.start(self.ops.as_ref()).await {
            Ok(handle) => {
                info!("[monitor] service up (pid={}, pgid={})", handle.pid, handle.pgid);
                self.handle = Some(handle);
            }
            Err(e) => error!(
                "[monitor] start failed: {e}; service log tail:\n{}",
                self.manager.log_tail(LOG_TAIL_LINES)
            ),
        }
    }
}
