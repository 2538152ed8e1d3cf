//! onchange - rebuild, test and restart Go programs when their sources change.

pub mod config;
pub mod display;
pub mod supervisor;
pub mod toolchain;
pub mod watcher;
