//! Locating and reading the TOML configuration file.

use std::path::{Path, PathBuf};

use super::OnchangeConfig;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = ".onchange.toml";

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    /// A file named on the command line; it must exist.
    Explicit(PathBuf),
    /// Candidates tried in order; defaults apply when none exists.
    Search(Vec<PathBuf>),
}

/// Finds and parses the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source: Source,
}

impl ConfigLoader {
    /// Look for `.onchange.toml` in the working directory, then for
    /// `onchange/config.toml` under the user's config directory.
    #[must_use]
    pub fn new() -> Self {
        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG))
            .chain(dirs::config_dir().map(|dir| dir.join("onchange").join("config.toml")))
            .collect();
        Self {
            source: Source::Search(candidates),
        }
    }

    /// Read exactly `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            source: Source::Explicit(path),
        }
    }

    /// Files this loader would consider, in order.
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        match &self.source {
            Source::Explicit(path) => std::slice::from_ref(path),
            Source::Search(paths) => paths,
        }
    }

    /// The file that `load` would read, if any.
    #[must_use]
    pub fn resolve(&self) -> Option<&Path> {
        match &self.source {
            Source::Explicit(path) => Some(path.as_path()),
            Source::Search(paths) => paths.iter().map(PathBuf::as_path).find(|p| p.is_file()),
        }
    }

    /// Read the configuration, falling back to defaults when searching
    /// finds nothing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the chosen file cannot be read or parsed.
    pub fn load(&self) -> Result<OnchangeConfig, ConfigError> {
        let Some(path) = self.resolve() else {
            tracing::debug!("No config file, using defaults");
            return Ok(OnchangeConfig::default());
        };
        tracing::debug!(path = %path.display(), "Reading config");
        parse_file(path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_file(path: &Path) -> Result<OnchangeConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors raised while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
