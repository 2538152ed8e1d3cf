//! Session state guarded by the session lock.

use crate::supervisor::{ErrorDeduper, ProcessSupervisor, Seen};

/// State touched only while the session lock is held.
#[derive(Debug, Default)]
pub struct SupervisorState {
    pub process: ProcessSupervisor,
    pub deduper: ErrorDeduper,
    pub last_test_failed: bool,
    stats: SessionStats,
}

impl SupervisorState {
    #[must_use]
    pub fn new(process: ProcessSupervisor) -> Self {
        Self {
            process,
            ..Self::default()
        }
    }

    pub fn record_cycle(&mut self) {
        self.stats.cycles = self.stats.cycles.saturating_add(1);
    }

    pub fn record_restart(&mut self) {
        self.stats.restarts = self.stats.restarts.saturating_add(1);
    }

    pub fn record_launch_failure(&mut self) {
        self.stats.launch_failures = self.stats.launch_failures.saturating_add(1);
    }

    pub fn record_failure(&mut self, seen: Seen) {
        match seen {
            Seen::Fresh => self.stats.reported = self.stats.reported.saturating_add(1),
            Seen::Repeat => self.stats.suppressed = self.stats.suppressed.saturating_add(1),
        }
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Cycles run (startup and one per handled change).
    pub cycles: usize,
    /// Successful process launches.
    pub restarts: usize,
    /// Failed process launches.
    pub launch_failures: usize,
    /// Failures shown to the user.
    pub reported: usize,
    /// Failures suppressed as repeats.
    pub suppressed: usize,
}
