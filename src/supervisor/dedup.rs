//! Suppression of repeated failure output.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::toolchain::ToolError;

/// Whether a failure should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seen {
    /// First occurrence of this output: show it.
    Fresh,
    /// Same as the last reported failure: suppress it.
    Repeat,
}

/// Remembers the last reported failure.
#[derive(Debug, Default)]
pub struct ErrorDeduper {
    last: Option<String>,
}

impl ErrorDeduper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `err` and remember it if it is new.
    ///
    /// Output is compared with run times removed, so a test failing the
    /// same way twice counts as a repeat. Errors without captured output
    /// (e.g. the tool could not be started) are always fresh and are not
    /// remembered.
    pub fn observe(&mut self, err: &ToolError) -> Seen {
        let Some(text) = err.captured() else {
            return Seen::Fresh;
        };
        let key = comparison_key(text);
        if self.last.as_deref() == Some(key.as_ref()) {
            return Seen::Repeat;
        }
        self.last = Some(key.into_owned());
        Seen::Fresh
    }

    /// Forget the last failure so the next one is shown again.
    pub fn clear(&mut self) {
        if self.last.take().is_some() {
            tracing::debug!("Cleared last error");
        }
    }

    /// Text of the last reported failure, without run times.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

/// Strip the durations `go test` prints, `(0.01s)` after a test name and
/// the trailing `\t0.005s` of a package summary line.
fn comparison_key(text: &str) -> Cow<'_, str> {
    static TIMINGS: OnceLock<Option<Regex>> = OnceLock::new();
    let timings = TIMINGS.get_or_init(|| {
        Regex::new(r"(?m) \(\d+(?:\.\d+)?s\)|\t\d+(?:\.\d+)?s$").ok()
    });
    match timings {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    }
}
