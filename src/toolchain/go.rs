//! Invocation of the `go` command.

use std::borrow::Cow;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{PackageNode, ToolError};

/// Default name of the external tool binary.
pub const DEFAULT_GO_BINARY: &str = "go";

/// Synthetic target naming every package.
pub const ALL_PACKAGES: &str = "all";

/// Marker of Go test source files.
const TEST_FILE_MARKER: &str = "_test.go";

/// A `go` subcommand run against packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Build,
    Install,
    Test,
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Install => "install",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The external build tool.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run `verb` against `targets`, optionally writing the build output to
    /// `output`, and return the import paths of the affected packages.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` if the tool cannot be started or reports failure.
    async fn run(
        &self,
        verb: Verb,
        targets: &[String],
        output: Option<&Path>,
    ) -> Result<Vec<String>, ToolError>;

    /// Describe the package at `import_path`, resolved relative to `from_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` if the package cannot be found or decoded.
    async fn describe(
        &self,
        import_path: &str,
        from_dir: Option<&Path>,
    ) -> Result<PackageNode, ToolError>;
}

/// Runs the real `go` command.
#[derive(Debug, Clone)]
pub struct GoTool {
    program: String,
}

impl Default for GoTool {
    fn default() -> Self {
        Self::new(DEFAULT_GO_BINARY)
    }
}

impl GoTool {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The binary being invoked.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command-line arguments for a run.
    #[must_use]
    pub fn build_args(verb: Verb, targets: &[String], output: Option<&Path>) -> Vec<String> {
        let mut args = vec![verb.as_str().to_string()];

        // `-v` makes the tool list every package it rebuilds on stderr.
        if verb != Verb::Test {
            args.push("-v".to_string());
        }

        if let Some(path) = output {
            args.push("-o".to_string());
            args.push(path.display().to_string());
        }

        args.extend(targets.iter().cloned());
        args
    }

    async fn execute(
        &self,
        args: &[String],
        dir: Option<&Path>,
    ) -> Result<std::process::Output, ToolError> {
        let line = command_line(&self.program, args);
        tracing::debug!(command = %line, "Running tool");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(ToolError::failed(
                line,
                output.status,
                &output.stdout,
                &output.stderr,
            ))
        }
    }
}

#[async_trait]
impl Toolchain for GoTool {
    async fn run(
        &self,
        verb: Verb,
        targets: &[String],
        output: Option<&Path>,
    ) -> Result<Vec<String>, ToolError> {
        let args = Self::build_args(verb, targets, output);
        let result = self.execute(&args, None).await?;
        Ok(parse_affected(&String::from_utf8_lossy(&result.stderr)))
    }

    async fn describe(
        &self,
        import_path: &str,
        from_dir: Option<&Path>,
    ) -> Result<PackageNode, ToolError> {
        let args = vec![
            "list".to_string(),
            "-json".to_string(),
            import_path.to_string(),
        ];
        let result = self.execute(&args, from_dir).await?;
        PackageNode::from_go_list(import_path, &result.stdout)
    }
}

/// Extract the affected import paths from `-v` output.
///
/// Headers (`# pkg`) and progress lines such as `go: downloading ...` are
/// skipped; every remaining line is a package the tool rebuilt.
#[must_use]
pub fn parse_affected(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !line.contains(char::is_whitespace))
        .map(String::from)
        .collect()
}

/// Whether `path` looks like a Go test source file.
///
/// Matches anywhere in the path, so editor backups such as
/// `server_test.go~` count as well.
#[must_use]
pub fn is_test_file(path: &Path) -> bool {
    path.to_string_lossy().contains(TEST_FILE_MARKER)
}

/// Render a command line for display.
#[must_use]
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|part| shell_escape::escape(Cow::Borrowed(part)))
        .collect::<Vec<_>>()
        .join(" ")
}
