//! Build, install and test invocations.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempPath;

use crate::toolchain::{base_name, ToolError, Toolchain, Verb};

/// A freshly built binary at a temporary path, removed on drop.
#[derive(Debug)]
pub struct Artifact {
    path: TempPath,
}

impl Artifact {
    /// Reserve a unique path named after `package` and unlink it so the
    /// tool can create the file itself.
    fn allocate(package: &str) -> Result<Self, ToolError> {
        let path = tempfile::Builder::new()
            .prefix(&format!("{}-", base_name(package)))
            .tempfile()
            .map_err(ToolError::Output)?
            .into_temp_path();
        let _ = std::fs::remove_file(&path);
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome of a build.
#[derive(Debug)]
pub struct BuildResult {
    /// Packages the tool rebuilt.
    pub affected: Vec<String>,
    /// Why the build failed, if it did.
    pub error: Option<ToolError>,
    /// The built binary; `None` if no output path could be allocated.
    pub artifact: Option<Artifact>,
}

impl BuildResult {
    fn failed(error: ToolError, artifact: Option<Artifact>) -> Self {
        Self {
            affected: Vec::new(),
            error: Some(error),
            artifact,
        }
    }
}

/// Runs the build tool on behalf of the session.
#[derive(Clone)]
pub struct BuildCoordinator {
    toolchain: Arc<dyn Toolchain>,
}

impl BuildCoordinator {
    #[must_use]
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self { toolchain }
    }

    /// The underlying toolchain.
    #[must_use]
    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// Build `package` into a temporary binary.
    pub async fn build(&self, package: &str) -> BuildResult {
        let artifact = match Artifact::allocate(package) {
            Ok(artifact) => artifact,
            Err(e) => return BuildResult::failed(e, None),
        };

        match self
            .toolchain
            .run(Verb::Build, &[package.to_string()], Some(artifact.path()))
            .await
        {
            Ok(affected) => {
                tracing::debug!(package, affected = affected.len(), "Build finished");
                BuildResult {
                    affected,
                    error: None,
                    artifact: Some(artifact),
                }
            }
            Err(e) => BuildResult::failed(e, Some(artifact)),
        }
    }

    /// Install `target` (a package or `all`), returning whether anything
    /// was reinstalled.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` if the install fails.
    pub async fn install(&self, target: &str) -> Result<bool, ToolError> {
        let affected = self
            .toolchain
            .run(Verb::Install, &[target.to_string()], None)
            .await?;
        tracing::debug!(target, affected = affected.len(), "Install finished");
        Ok(!affected.is_empty())
    }

    /// Run the tests of `package`.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` if the tests fail.
    pub async fn test(&self, package: &str) -> Result<(), ToolError> {
        self.toolchain
            .run(Verb::Test, &[package.to_string()], None)
            .await?;
        Ok(())
    }
}
