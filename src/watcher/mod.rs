//! Watcher module: which directories to watch and which changes matter.

mod error;
mod filter;
mod fs_watcher;
mod registry;
mod resolver;

pub use error::{FilterError, WatcherError};
pub use filter::{ChangeFilter, Verdict, MATCH_ALL};
pub use fs_watcher::{DirWatcher, FsWatcher, RawEvent, MIN_DEBOUNCE};
pub use registry::{WatchSet, WatchTarget};
pub use resolver::{walk_dirs, Resolution, WatchSetResolver};
