//! Toolchain error types.

use std::process::ExitStatus;

/// Errors that can occur when invoking the external tool.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// The tool binary could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The tool ran and reported failure.
    #[error("{command} failed ({status}):\n{}", pick_output(.stdout, .stderr))]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    /// A scratch path for the build output could not be allocated.
    #[error("Failed to allocate build output: {0}")]
    Output(#[source] std::io::Error),

    /// Package metadata could not be decoded.
    #[error("Invalid package metadata for {import_path}: {source}")]
    Metadata {
        import_path: String,
        source: serde_json::Error,
    },
}

impl ToolError {
    /// Build a `Failed` error from a finished invocation.
    #[must_use]
    pub fn failed(
        command: impl Into<String>,
        status: ExitStatus,
        stdout: &[u8],
        stderr: &[u8],
    ) -> Self {
        Self::Failed {
            command: command.into(),
            status: status.to_string(),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }

    /// The output text that identifies this failure, if any.
    ///
    /// This is the captured stderr, or stdout when stderr is empty since
    /// `go test` reports failures on stdout.
    #[must_use]
    pub fn captured(&self) -> Option<&str> {
        match self {
            Self::Failed { stdout, stderr, .. } => Some(pick_output(stdout, stderr)),
            Self::Spawn { .. } | Self::Output(_) | Self::Metadata { .. } => None,
        }
    }
}

fn pick_output<'a>(stdout: &'a str, stderr: &'a str) -> &'a str {
    if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    }
}
