//! Toolchain module: the seam to the external `go` command.
//!
//! Builds, installs and tests packages and describes package metadata.

mod error;
mod go;
mod package;

pub use error::ToolError;
pub use go::*;
pub use package::*;
