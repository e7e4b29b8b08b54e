//! Supervised child processes.
//!
//! Launches backend processes with their output redirected to a shared log
//! file and watches each one with a fire-and-forget monitor task. The
//! monitor's sole purpose is to detect process death: it records the exit
//! status into a lock-protected slot on the handle and logs it, but never
//! fails in-flight scenario assertions.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::HarnessError;

/// Shared log file for supervised processes.
///
/// Two cooperating processes (e.g. an ACME server and its challenge
/// responder) write interleaved into one sink, as each spawn gets its own
/// cloned file handle.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self, HarnessError> {
        let file = File::create(path)?;
        debug!(path = %path.display(), "Opened process log sink");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cloned stdout/stderr handles for one child.
    fn stdio(&self) -> Result<(Stdio, Stdio), HarnessError> {
        let out = self.file.try_clone()?;
        let err = self.file.try_clone()?;
        Ok((Stdio::from(out), Stdio::from(err)))
    }
}

/// Description of a child process to launch.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Short name used in logs
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherited when absent
    pub cwd: Option<PathBuf>,
    /// Environment overlay on top of the inherited environment
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Handle to one supervised child process.
///
/// Dropping the handle does not kill the child; termination is explicit via
/// [`ProcessHandle::terminate`].
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    pid: u32,
    exit: Arc<Mutex<Option<ExitStatus>>>,
    _monitor: JoinHandle<()>,
}

impl ProcessHandle {
    /// Launch the process described by `spec` with output redirected into
    /// `log`, and start its monitor task.
    pub fn spawn(spec: &ProcessSpec, log: &LogSink) -> Result<Self, HarnessError> {
        let (stdout, stderr) = log.stdio()?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(ref dir) = spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| HarnessError::Spawn {
            name: spec.name.clone(),
            source,
        })?;
        let pid = child.id().ok_or_else(|| {
            HarnessError::Config(format!("{} exited before supervision began", spec.name))
        })?;

        let exit = Arc::new(Mutex::new(None));
        let monitor = tokio::spawn(monitor_child(spec.name.clone(), child, Arc::clone(&exit)));

        info!(name = %spec.name, pid = pid, "Spawned supervised process");

        Ok(Self {
            name: spec.name.clone(),
            pid,
            exit,
            _monitor: monitor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status recorded by the monitor, `None` while running.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit.lock()
    }

    pub fn is_running(&self) -> bool {
        self.exit_status().is_none()
    }

    /// Send SIGTERM to the child. Best-effort and idempotent: a process
    /// that already exited is left alone.
    pub fn terminate(&self) {
        if !self.is_running() {
            debug!(name = %self.name, "Process already exited, nothing to terminate");
            return;
        }
        debug!(name = %self.name, pid = self.pid, "Terminating supervised process");
        if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            debug!(name = %self.name, error = %e, "Termination signal not delivered");
        }
    }
}

/// Monitor one child until it exits and record the status.
///
/// Fire-and-forget: a crashed backend does not abort running assertions,
/// it only shows up in `exit_status()` and the logs.
async fn monitor_child(name: String, mut child: Child, exit: Arc<Mutex<Option<ExitStatus>>>) {
    match child.wait().await {
        Ok(status) => {
            if status.success() {
                debug!(name = %name, "Supervised process exited cleanly");
            } else {
                warn!(name = %name, status = %status, "Supervised process exited");
            }
            *exit.lock() = Some(status);
        }
        Err(e) => {
            warn!(name = %name, error = %e, "Failed to await supervised process");
        }
    }
}
