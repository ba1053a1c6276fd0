// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::{CommandSpec, SupervisorConfig};
use crate::errors::StartError;
use crate::exec;
use anyhow::{Context, anyhow};
use log::{info, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{Duration, Instant, sleep};

pub const START_GRACE: Duration = Duration::from_secs(1);
pub const STOP_GRACE: Duration = Duration::from_secs(5);
const SIGKILL_WAIT: Duration = Duration::from_secs(2);
const STOP_POLL: Duration = Duration::from_millis(100);
const PORT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// The unit of control for the supervised service: the launched leader PID
/// and its process group id. Persisted so the handle survives supervisor
/// restarts; a loaded handle may reference a group that already exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHandle {
    pub pid: i32,
    pub pgid: i32,
}

impl ServiceHandle {
    pub fn load(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let mut lines = contents.lines();
        let pid = lines.next()?.trim().parse().ok()?;
        let pgid = lines.next()?.trim().parse().ok()?;
        Some(Self { pid, pgid })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, format!("{}\n{}\n", self.pid, self.pgid))
            .with_context(|| format!("writing handle file: {}", path.display()))
    }

    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

/// OS capability seam for process-group and port probing; tests substitute
/// a fake that simulates forking children. Probes return `None` when the
/// check could not be performed, as opposed to "checked and false".
pub trait ProcessOps {
    fn signal_group(&self, pgid: i32, sig: Signal);
    fn group_alive(&self, pgid: i32) -> Option<bool>;
    fn pid_alive(&self, pid: i32) -> Option<bool>;
    fn port_open(&self, port: u16) -> Option<bool>;
}

pub struct UnixOps;

impl ProcessOps for UnixOps {
    fn signal_group(&self, pgid: i32, sig: Signal) {
        if let Err(e) = signal::killpg(Pid::from_raw(pgid), sig) {
            // ESRCH just means the group is already gone.
            if e != Errno::ESRCH {
                warn!("[service] failed to send {sig} to group {pgid}: {e}");
            }
        }
    }

    fn group_alive(&self, pgid: i32) -> Option<bool> {
        match signal::killpg(Pid::from_raw(pgid), None) {
            Ok(()) => Some(true),
            Err(Errno::ESRCH) => Some(false),
            // The group exists but belongs to another user.
            Err(Errno::EPERM) => Some(true),
            Err(_) => None,
        }
    }

    fn pid_alive(&self, pid: i32) -> Option<bool> {
        match signal::kill(Pid::from_raw(pid), None) {
            Ok(()) => Some(true),
            Err(Errno::ESRCH) => Some(false),
            Err(Errno::EPERM) => Some(true),
            Err(_) => None,
        }
    }

    fn port_open(&self, port: u16) -> Option<bool> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        match TcpStream::connect_timeout(&addr, PORT_CONNECT_TIMEOUT) {
            Ok(_) => Some(true),
            Err(e) => match e.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::TimedOut => Some(false),
                _ => None,
            },
        }
    }
}

/// Starts the service as the leader of a fresh session/process group and
/// stops the whole group, so forked children are reached by a single
/// negative-PID signal.
pub struct ServiceManager {
    serve: CommandSpec,
    working_dir: PathBuf,
    port: u16,
    log_path: PathBuf,
    handle_path: PathBuf,
}

impl ServiceManager {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            serve: config.serve.clone(),
            working_dir: config.app_dir.clone(),
            port: config.port,
            log_path: config.service_log_path(),
            handle_path: config.handle_path(),
        }
    }

    pub fn handle_path(&self) -> &Path {
        &self.handle_path
    }

    /// Spawn the serve command and verify it survives a short grace period.
    /// Alive means any of: launcher still running, group still has members,
    /// or the service port accepts connections.
    pub async fn start(&self, ops: &dyn ProcessOps) -> Result<ServiceHandle, StartError> {
        let log_file = self
            .open_log()
            .map_err(|e| StartError::Spawn(anyhow!(e)))?;
        let log_clone = log_file
            .try_clone()
            .map_err(|e| StartError::Spawn(anyhow!(e)))?;

        let mut cmd = Command::new(&self.serve.command);
        cmd.args(&self.serve.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_clone));
        for (k, v) in &self.serve.env {
            cmd.env(k, v);
        }
        // New session: the leader's PID becomes its own process group id.
        unsafe {
            cmd.pre_exec(|| {
                unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| {
            StartError::Spawn(
                anyhow!(e).context(format!("[service] failed to spawn: {}", self.serve.command)),
            )
        })?;
        let Some(pid) = child.id().map(|p| p as i32) else {
            return Err(StartError::DiedEarly);
        };

        // If pgid discovery races the OS assignment, the leader PID is its
        // own group id by construction of setsid.
        let pgid = unistd::getpgid(Some(Pid::from_raw(pid)))
            .map(Pid::as_raw)
            .unwrap_or(pid);
        info!(
            "[service] spawned (pid={pid}, pgid={pgid}, cmd={})",
            self.serve.command
        );

        sleep(START_GRACE).await;
        let launcher_alive = matches!(child.try_wait(), Ok(None));
        let alive = launcher_alive
            || ops.group_alive(pgid) == Some(true)
            || ops.port_open(self.port) == Some(true);
        if !alive {
            return Err(StartError::DiedEarly);
        }

        let handle = ServiceHandle { pid, pgid };
        if let Err(e) = handle.save(&self.handle_path) {
            warn!("[service] {e:#}");
        }
        // The child handle is dropped here; the runtime reaps the leader
        // after exit, and the group id stays the unit of control.
        Ok(handle)
    }

    /// Best-effort group stop: SIGTERM, grace period, SIGKILL stragglers.
    /// Safe to call on an already-dead or unknown group, and safe twice;
    /// the persisted handle is removed regardless.
    pub async fn stop(&self, handle: ServiceHandle, ops: &dyn ProcessOps) {
        info!("[service] sending SIGTERM to group {}", handle.pgid);
        ops.signal_group(handle.pgid, Signal::SIGTERM);

        if !self.wait_group_gone(handle.pgid, STOP_GRACE, ops).await {
            warn!(
                "[service] group {} still alive after {}s, sending SIGKILL",
                handle.pgid,
                STOP_GRACE.as_secs()
            );
            ops.signal_group(handle.pgid, Signal::SIGKILL);
            if !self.wait_group_gone(handle.pgid, SIGKILL_WAIT, ops).await {
                warn!("[service] group {} survived SIGKILL, giving up", handle.pgid);
            }
        }

        ServiceHandle::remove(&self.handle_path);
    }

    async fn wait_group_gone(&self, pgid: i32, timeout: Duration, ops: &dyn ProcessOps) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if ops.group_alive(pgid) != Some(true) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(STOP_POLL).await;
        }
    }

    /// Tail of the captured service stdout/stderr, for failure diagnostics.
    pub fn log_tail(&self, lines: usize) -> String {
        match std::fs::read_to_string(&self.log_path) {
            Ok(contents) => exec::tail(&contents, lines),
            Err(_) => String::new(),
        }
    }

    fn open_log(&self) -> std::io::Result<std::fs::File> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
    }
}
