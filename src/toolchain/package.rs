//! Package metadata as reported by `go list -json`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::ToolError;

/// A node of the import graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    /// Import path, e.g. `example.com/app/server`.
    pub import_path: String,
    /// Directory holding the package sources.
    pub dir: PathBuf,
    /// Import paths of the packages this one imports directly.
    pub imports: Vec<String>,
    /// Whether the package builds a command (`package main`).
    pub is_command: bool,
    /// Whether the package is part of the standard library.
    pub is_standard: bool,
}

impl PackageNode {
    /// Create a non-standard package node.
    #[must_use]
    pub fn new(import_path: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            import_path: import_path.into(),
            dir: dir.into(),
            imports: Vec::new(),
            is_command: false,
            is_standard: false,
        }
    }

    /// Set the direct imports.
    #[must_use]
    pub fn with_imports(mut self, imports: &[&str]) -> Self {
        self.imports = imports.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Mark the package as a command.
    #[must_use]
    pub fn command(mut self) -> Self {
        self.is_command = true;
        self
    }

    /// Mark the package as part of the standard library.
    #[must_use]
    pub fn standard(mut self) -> Self {
        self.is_standard = true;
        self
    }

    /// Last element of the import path, used as the binary name.
    #[must_use]
    pub fn base_name(&self) -> &str {
        base_name(&self.import_path)
    }

    /// Directory as a path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode the JSON object printed by `go list -json <pkg>`.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::Metadata` if the JSON does not describe a package.
    pub fn from_go_list(import_path: &str, json: &[u8]) -> Result<Self, ToolError> {
        let raw: GoListPackage =
            serde_json::from_slice(json).map_err(|source| ToolError::Metadata {
                import_path: import_path.to_string(),
                source,
            })?;
        Ok(raw.into())
    }
}

/// Last element of an import path.
#[must_use]
pub fn base_name(import_path: &str) -> &str {
    import_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(import_path)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoListPackage {
    import_path: String,
    dir: PathBuf,
    #[serde(default)]
    name: String,
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    standard: bool,
}

impl From<GoListPackage> for PackageNode {
    fn from(raw: GoListPackage) -> Self {
        Self {
            is_command: raw.name == "main",
            import_path: raw.import_path,
            dir: raw.dir,
            imports: raw.imports,
            is_standard: raw.standard,
        }
    }
}
