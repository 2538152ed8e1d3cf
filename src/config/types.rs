//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::toolchain::{ALL_PACKAGES, DEFAULT_GO_BINARY};
use crate::watcher::MATCH_ALL;

/// How the supervised binary is obtained for a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartMode {
    /// Run the binary just built at a temporary path.
    Artifact,
    /// Run a named binary from the search path after installing.
    Command(String),
}

/// Configuration for the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnchangeConfig {
    /// Regex matched against full changed-file paths.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Install all packages on change.
    #[serde(default = "default_true")]
    pub install: bool,
    /// Run the changed package's tests after a restart.
    #[serde(default = "default_true")]
    pub test: bool,
    /// Clear the terminal before each restart.
    #[serde(default = "default_true")]
    pub clear: bool,
    /// Verbose diagnostics.
    #[serde(default)]
    pub verbose: bool,
    /// Named binary to run instead of the freshly built one.
    #[serde(default)]
    pub restart_command: Option<String>,
    /// The external build tool.
    #[serde(default = "default_go_binary")]
    pub go_binary: String,
    /// Debounce window for filesystem events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_pattern() -> String {
    MATCH_ALL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_go_binary() -> String {
    DEFAULT_GO_BINARY.to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for OnchangeConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            install: true,
            test: true,
            clear: true,
            verbose: false,
            restart_command: None,
            go_binary: default_go_binary(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl OnchangeConfig {
    #[must_use]
    pub fn restart_mode(&self) -> RestartMode {
        match &self.restart_command {
            Some(name) => RestartMode::Command(name.clone()),
            None => RestartMode::Artifact,
        }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// What to install on change, if anything.
    ///
    /// Installing is skipped when disabled, except that a named restart
    /// binary still needs the root package installed.
    #[must_use]
    pub fn install_target(&self, root: &str) -> Option<String> {
        if self.install {
            Some(ALL_PACKAGES.to_string())
        } else if self.restart_command.is_some() {
            Some(root.to_string())
        } else {
            None
        }
    }
}
