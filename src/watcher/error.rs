//! Watcher error types.

use std::path::PathBuf;

use crate::toolchain::ToolError;

/// Errors that can occur while resolving or watching the watch set.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// The root package could not be resolved.
    #[error("Cannot resolve package {import_path}: {source}")]
    Unresolvable {
        import_path: String,
        source: ToolError,
    },

    /// A directory of the watch set could not be walked.
    #[error("Cannot walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The watcher lock was poisoned by a panicking task.
    #[error("Watcher lock poisoned")]
    Poisoned,
}

/// Errors that can occur when building the change filter.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    /// Invalid regex pattern.
    #[error("Invalid file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}
