//! Decides whether a changed path is worth acting on.

use std::path::Path;

use regex::Regex;

use super::FilterError;

/// Pattern matching every path.
pub const MATCH_ALL: &str = ".";

/// Outcome of filtering a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The change should trigger a cycle.
    Accept,
    /// The base name starts with a dot (editor swap files and the like).
    Hidden,
    /// The path does not match the configured pattern.
    NoMatch,
}

impl Verdict {
    #[must_use]
    pub fn is_accept(self) -> bool {
        self == Self::Accept
    }
}

/// Stateless filter applied to every raw change event.
///
/// Without a pattern every visible path is accepted.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    pattern: Option<Regex>,
}

impl ChangeFilter {
    /// Create a filter matching full paths against `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPattern` if the regex is invalid.
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let pattern = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Classify a changed path.
    #[must_use]
    pub fn check(&self, path: &Path) -> Verdict {
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        if hidden {
            return Verdict::Hidden;
        }

        match &self.pattern {
            Some(pattern) if !pattern.is_match(&path.to_string_lossy()) => Verdict::NoMatch,
            _ => Verdict::Accept,
        }
    }

    /// Whether a changed path should trigger a cycle.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        self.check(path).is_accept()
    }

    /// Get the pattern string (for debugging/display).
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_ref().map_or(MATCH_ALL, Regex::as_str)
    }
}
