//! Watch set resolution.
//!
//! Walks the directory tree of a root package and of every package it
//! imports, transitively, collecting the directories to watch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use super::{WatchTarget, WatcherError};
use crate::toolchain::{PackageNode, Toolchain};

/// Directories and packages found by one resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Directories to watch, without duplicates, in discovery order.
    pub targets: Vec<WatchTarget>,
    /// Import paths of the packages that were walked.
    pub packages: Vec<String>,
    /// Standard-library packages met along the way; they are never walked.
    pub standard: Vec<String>,
    /// Imports that could not be resolved.
    pub skipped: Vec<String>,
}

impl Resolution {
    /// Every package that resolved, walked or not.
    pub fn resolved(&self) -> impl Iterator<Item = &str> {
        self.packages
            .iter()
            .chain(&self.standard)
            .map(String::as_str)
    }

    /// Directories only, in discovery order.
    #[must_use]
    pub fn dirs(&self) -> Vec<&Path> {
        self.targets.iter().map(|t| t.dir.as_path()).collect()
    }
}

/// Resolves the watch set of a package through its import graph.
pub struct WatchSetResolver<'a> {
    toolchain: &'a dyn Toolchain,
}

impl<'a> WatchSetResolver<'a> {
    #[must_use]
    pub fn new(toolchain: &'a dyn Toolchain) -> Self {
        Self { toolchain }
    }

    /// Resolve the directories of `root` and its transitive imports.
    ///
    /// Packages in `known` are not walked again (except `root` itself), so a
    /// package registered earlier only contributes what it newly imports.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Unresolvable` if `root` cannot be described.
    /// Unresolvable imports are skipped.
    pub async fn resolve(
        &self,
        root: &str,
        from_dir: Option<&Path>,
        known: &HashSet<String>,
    ) -> Result<Resolution, WatcherError> {
        let root_node = self
            .toolchain
            .describe(root, from_dir)
            .await
            .map_err(|source| WatcherError::Unresolvable {
                import_path: root.to_string(),
                source,
            })?;

        let mut resolution = Resolution::default();
        let mut owners: HashMap<PathBuf, usize> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<PackageNode> = vec![root_node];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.import_path.clone()) {
                continue;
            }
            if node.is_standard {
                resolution.standard.push(node.import_path);
                continue;
            }

            tracing::trace!(package = %node.import_path, dir = %node.dir.display(), "Walking package");
            Self::collect_dirs(&node, &mut resolution.targets, &mut owners);
            resolution.packages.push(node.import_path.clone());

            // Reversed so the first import is walked first.
            for import in node.imports.iter().rev() {
                if visited.contains(import) || known.contains(import) {
                    continue;
                }
                match self.toolchain.describe(import, Some(&node.dir)).await {
                    Ok(imported) => stack.push(imported),
                    Err(e) => {
                        tracing::debug!(
                            package = %import,
                            importer = %node.import_path,
                            error = %e,
                            "Skipping unresolvable import"
                        );
                        resolution.skipped.push(import.clone());
                    }
                }
            }
        }

        Ok(resolution)
    }

    /// Add the package's directory subtree to `targets`.
    ///
    /// The package's own directory is always attributed to it, even when an
    /// enclosing package was walked first.
    fn collect_dirs(
        node: &PackageNode,
        targets: &mut Vec<WatchTarget>,
        owners: &mut HashMap<PathBuf, usize>,
    ) {
        if let Some(&idx) = owners.get(&node.dir) {
            targets[idx].package.clone_from(&node.import_path);
        }

        for dir in walk_dirs(&node.dir) {
            if owners.contains_key(&dir) {
                continue;
            }
            owners.insert(dir.clone(), targets.len());
            targets.push(WatchTarget::new(dir, node.import_path.clone()));
        }
    }
}

/// Every non-hidden directory under `root`, including `root`.
///
/// Unreadable entries are skipped with a debug diagnostic.
#[must_use]
pub fn walk_dirs(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .sort_by_file_name(std::ffi::OsStr::cmp)
        .build();

    walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(root = %root.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_dir()))
        .map(ignore::DirEntry::into_path)
        .collect()
}
