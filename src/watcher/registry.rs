//! Registry of directories under watch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// A directory under watch and the package that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchTarget {
    pub dir: PathBuf,
    pub package: String,
}

impl WatchTarget {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package: package.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Targets {
    ordered: Vec<WatchTarget>,
    by_dir: HashMap<PathBuf, usize>,
    /// Owners of registered directories plus packages marked resolved.
    packages: HashSet<String>,
}

/// Append-only set of watch targets, safe to extend from concurrent tasks.
///
/// A directory is registered at most once; the first registration decides
/// its owning package.
#[derive(Debug, Default)]
pub struct WatchSet {
    targets: RwLock<Targets>,
}

impl WatchSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add targets, returning those whose directory was not registered yet.
    pub fn register(&self, targets: impl IntoIterator<Item = WatchTarget>) -> Vec<WatchTarget> {
        let mut guard = self
            .targets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut added = Vec::new();

        for target in targets {
            if guard.by_dir.contains_key(&target.dir) {
                continue;
            }
            let idx = guard.ordered.len();
            guard.by_dir.insert(target.dir.clone(), idx);
            guard.packages.insert(target.package.clone());
            guard.ordered.push(target.clone());
            added.push(target);
        }

        added
    }

    /// Package owning the directory that contains `path`.
    ///
    /// A path that is itself a registered directory belongs to that
    /// directory's package.
    #[must_use]
    pub fn package_for(&self, path: &Path) -> Option<String> {
        let guard = self.read();
        std::iter::once(path)
            .chain(path.parent())
            .find_map(|dir| guard.by_dir.get(dir))
            .map(|&idx| guard.ordered[idx].package.clone())
    }

    /// Remember packages that were resolved, whether or not they own a
    /// directory (standard-library packages never do).
    pub fn mark_resolved<I, S>(&self, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self
            .targets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.packages.extend(packages.into_iter().map(Into::into));
    }

    /// Packages that need not be resolved again: owners of registered
    /// directories and packages marked resolved.
    #[must_use]
    pub fn known_packages(&self) -> HashSet<String> {
        self.read().packages.clone()
    }

    /// Snapshot of all targets in registration order.
    #[must_use]
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.read().ordered.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Targets> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner)
    }
}
