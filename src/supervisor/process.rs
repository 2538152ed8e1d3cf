//! Supervised process spawning and replacement.
//!
//! Holds at most one child at a time. A restart terminates the current
//! child and waits for it before the replacement is launched.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error, program: &OsStr) -> Self {
        let program = program.to_string_lossy().into_owned();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program),
            _ => Self::Io(err),
        }
    }
}

/// Owner of the one supervised child process.
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    child: Option<Child>,
    argv0: Option<String>,
}

impl ProcessSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Present children with `argv0` as their program name (Unix only).
    #[must_use]
    pub fn with_argv0(mut self, argv0: impl Into<String>) -> Self {
        self.argv0 = Some(argv0.into());
        self
    }

    /// Whether a child is held (it may have exited on its own).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Get the process ID of the current child, if any.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Replace the current child with `program args...`.
    ///
    /// The previous child is terminated and reaped first. On launch failure
    /// no child is held afterwards.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the new process fails to spawn.
    pub async fn restart(
        &mut self,
        program: impl AsRef<OsStr>,
        args: &[String],
    ) -> Result<u32, SpawnError> {
        if let Some(status) = self.stop().await? {
            tracing::debug!(%status, "Previous process exited");
        }

        let program = program.as_ref();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(unix)]
        if let Some(ref argv0) = self.argv0 {
            cmd.arg0(argv0);
        }

        let child = cmd.spawn().map_err(|e| SpawnError::from_io(e, program))?;
        let pid = child.id().unwrap_or_default();
        tracing::info!(pid, program = %program.to_string_lossy(), "Started process");
        self.child = Some(child);
        Ok(pid)
    }

    /// Terminate the current child, if any, and wait for it to exit.
    ///
    /// There is no forced-kill timeout: a child ignoring the termination
    /// signal blocks the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn stop(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };

        // Already exited on its own.
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        terminate(&mut child).await.map(Some)
    }
}

#[cfg(unix)]
async fn terminate(child: &mut Child) -> std::io::Result<ExitStatus> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM failed");
        }
    }
    child.wait().await
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) -> std::io::Result<ExitStatus> {
    child.kill().await?;
    child.wait().await
}
