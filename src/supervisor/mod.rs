//! Supervisor module: process lifecycle, build orchestration and the
//! event loop driving them.

mod build;
mod dedup;
mod event_loop;
mod process;
mod session;
mod state;

pub use build::*;
pub use dedup::*;
pub use event_loop::*;
pub use process::*;
pub use session::*;
pub use state::*;
