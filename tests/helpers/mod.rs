// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// A supervised test application: a scratch dir with a manifest, a source
/// tree, counting install/build commands, and a config file for the daemon.
pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub config_path: PathBuf,
}

impl TestApp {
    /// `serve_script` runs under `/bin/sh -c` inside the app dir.
    pub fn new(serve_script: &str) -> Self {
        Self::with_build_script("echo b >> build.count; mkdir -p dist", serve_script)
    }

    pub fn with_build_script(build_script: &str, serve_script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), b"{\"deps\": 1}").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.js"), b"v1").unwrap();

        let yaml = format!(
            concat!(
                "app_dir: {app}\n",
                "source_dir: src\n",
                "install: {{command: /bin/sh, args: ['-c', 'echo i >> install.count; mkdir -p node_modules']}}\n",
                "build: {{command: /bin/sh, args: ['-c', {build:?}]}}\n",
                "serve: {{command: /bin/sh, args: ['-c', {serve:?}]}}\n",
                "port: 1\n",
                "interval_secs: 1\n",
            ),
            app = dir.path().display(),
            build = build_script,
            serve = serve_script,
        );
        let config_path = dir.path().join("buildservd.yaml");
        std::fs::write(&config_path, yaml).unwrap();
        Self { dir, config_path }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_file(&self, name: &str) -> PathBuf {
        self.path().join(".buildservd").join(name)
    }

    /// Lines appended by the counting install/build commands.
    pub fn count(&self, file: &str) -> usize {
        std::fs::read_to_string(self.path().join(file))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// The persisted process-group id, if a handle file exists.
    pub fn recorded_pgid(&self) -> Option<i32> {
        let contents = std::fs::read_to_string(self.state_file("service.pgid")).ok()?;
        contents.lines().nth(1)?.trim().parse().ok()
    }
}

/// Handle to a running buildservd daemon under test.
pub struct DaemonHandle {
    child: Child,
    log_lines: Arc<Mutex<Vec<String>>>,
    _stdout_thread: std::thread::JoinHandle<()>,
    _stderr_thread: std::thread::JoinHandle<()>,
}

impl DaemonHandle {
    pub fn start(app: &TestApp) -> Self {
        let bin = env!("CARGO_BIN_EXE_buildservd");
        let mut child = Command::new(bin)
            .arg("--config")
            .arg(&app.config_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start buildservd");

        let stdout = child.stdout.take().expect("failed to capture stdout");
        let stderr = child.stderr.take().expect("failed to capture stderr");
        let log_lines = Arc::new(Mutex::new(Vec::<String>::new()));

        // simple_logger writes INFO to stdout, WARN/ERROR to stderr.
        let collect = |stream: Box<dyn std::io::Read + Send>,
                       lines: Arc<Mutex<Vec<String>>>,
                       tag: &'static str| {
            std::thread::spawn(move || {
                for line in BufReader::new(stream).lines() {
                    match line {
                        Ok(l) => {
                            eprintln!("[{tag}] {l}");
                            lines.lock().unwrap().push(l);
                        }
                        Err(_) => break,
                    }
                }
            })
        };
        let stdout_thread = collect(Box::new(stdout), Arc::clone(&log_lines), "daemon");
        let stderr_thread = collect(Box::new(stderr), Arc::clone(&log_lines), "daemon:err");

        Self {
            child,
            log_lines,
            _stdout_thread: stdout_thread,
            _stderr_thread: stderr_thread,
        }
    }

    pub fn wait_for_log(&self, pattern: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let lines = self.log_lines.lock().unwrap();
                if lines.iter().any(|l| l.contains(pattern)) {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn wait_for_log_default(&self, pattern: &str) -> bool {
        self.wait_for_log(pattern, DEFAULT_TIMEOUT)
    }

    pub fn count_log_matches(&self, pattern: &str) -> usize {
        let lines = self.log_lines.lock().unwrap();
        lines.iter().filter(|l| l.contains(pattern)).count()
    }

    pub fn wait_for_log_count(&self, pattern: &str, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count_log_matches(pattern) >= n {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn send_signal(&self, sig: Signal) {
        let pid = self.child.id() as i32;
        signal::kill(Pid::from_raw(pid), sig).expect("failed to signal daemon");
    }

    /// SIGTERM the daemon and wait for a clean exit.
    pub fn stop(&mut self) -> std::process::ExitStatus {
        self.send_signal(Signal::SIGTERM);
        self.wait_with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn wait_with_timeout(&mut self, timeout: Duration) -> std::process::ExitStatus {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait().expect("failed to check daemon status") {
                Some(status) => return status,
                None => {
                    if Instant::now() >= deadline {
                        self.child.kill().ok();
                        return self.child.wait().expect("failed to wait on killed daemon");
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn pid_is_alive(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

pub fn group_is_alive(pgid: i32) -> bool {
    signal::killpg(Pid::from_raw(pgid), None).is_ok()
}

/// Poll `condition` until it holds or the timeout elapses.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
