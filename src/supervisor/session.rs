//! The supervision session: state guarded by one lock and the
//! install/build/restart/test cycle run while holding it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{OnchangeConfig, RestartMode};
use crate::display;
use crate::supervisor::{
    Artifact, BuildCoordinator, ProcessSupervisor, Seen, SessionStats, SupervisorState,
};
use crate::toolchain::{base_name, is_test_file, ToolError, Toolchain, Verb};
use crate::watcher::{DirWatcher, WatchSet, WatchSetResolver, WatchTarget, WatcherError};

/// An accepted filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the changed file or directory.
    pub path: PathBuf,
    /// Import path of the package owning the change, if known.
    pub package: Option<String>,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, package: Option<String>) -> Self {
        Self {
            path: path.into(),
            package,
        }
    }
}

/// Supervises one root package.
pub struct Session {
    config: OnchangeConfig,
    root: String,
    args: Vec<String>,
    coordinator: BuildCoordinator,
    watch_set: Arc<WatchSet>,
    watcher: Arc<dyn DirWatcher>,
    state: Mutex<SupervisorState>,
    shutdown: CancellationToken,
}

impl Session {
    /// Create a session for `root`, forwarding `args` to the supervised
    /// process.
    #[must_use]
    pub fn new(
        config: OnchangeConfig,
        root: impl Into<String>,
        args: Vec<String>,
        toolchain: Arc<dyn Toolchain>,
        watcher: Arc<dyn DirWatcher>,
    ) -> Self {
        let root = root.into();
        let process = ProcessSupervisor::new().with_argv0(base_name(&root));
        Self {
            config,
            args,
            coordinator: BuildCoordinator::new(toolchain),
            watch_set: Arc::new(WatchSet::new()),
            watcher,
            state: Mutex::new(SupervisorState::new(process)),
            shutdown: CancellationToken::new(),
            root,
        }
    }

    /// Import path of the root package.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn watch_set(&self) -> &Arc<WatchSet> {
        &self.watch_set
    }

    /// Token cancelled when the session shuts down.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Resolve and watch the root package's directories.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Unresolvable` if the root package cannot be
    /// resolved.
    pub async fn start(&self) -> Result<usize, WatcherError> {
        let added = self.register_package(&self.root, None).await?;
        display::print_watching(
            &self.root,
            self.watch_set.len(),
            self.watch_set.known_packages().len(),
        );
        Ok(added.len())
    }

    /// Resolve `package` and its imports, watching directories not yet
    /// in the watch set. Returns the newly watched targets.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Unresolvable` if `package` cannot be resolved.
    pub async fn register_package(
        &self,
        package: &str,
        from_dir: Option<&Path>,
    ) -> Result<Vec<WatchTarget>, WatcherError> {
        let known = self.watch_set.known_packages();
        let resolution = WatchSetResolver::new(self.coordinator.toolchain())
            .resolve(package, from_dir, &known)
            .await?;

        self.watch_set.mark_resolved(resolution.resolved());
        let added = self.watch_set.register(resolution.targets);
        for target in &added {
            if let Err(e) = self.watcher.watch_dir(&target.dir) {
                tracing::warn!(dir = %target.dir.display(), error = %e, "Cannot watch directory");
            }
        }
        if !added.is_empty() {
            tracing::debug!(package, added = added.len(), "Extended watch set");
        }
        Ok(added)
    }

    /// Run the startup cycle; it always restarts the process.
    pub async fn initial_cycle(&self) {
        let mut state = self.state.lock().await;
        self.cycle(&mut state, &self.root).await;
    }

    /// Handle one accepted change. Waits for the session lock, so
    /// concurrent calls run one after another.
    pub async fn handle_change(&self, event: ChangeEvent) {
        let mut state = self.state.lock().await;
        if self.shutdown.is_cancelled() {
            tracing::debug!(path = %event.path.display(), "Dropping change during shutdown");
            return;
        }
        tracing::debug!(path = %event.path.display(), "Change triggered cycle");

        if is_test_file(&event.path) {
            state.deduper.clear();
        }

        if let Some(package) = &event.package {
            if let Err(e) = self.register_package(package, event.path.parent()).await {
                tracing::debug!(package = %package, error = %e, "Cannot extend watch set");
            }
        }

        let test_target = event.package.as_deref().unwrap_or(&self.root);
        self.cycle(&mut state, test_target).await;
    }

    /// Stop the supervised process and refuse further cycles.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut state = self.state.lock().await;
        match state.process.stop().await {
            Ok(Some(status)) => tracing::info!(%status, "Stopped process"),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to stop process"),
        }
    }

    /// Process ID of the supervised child, if one is held.
    pub async fn child_id(&self) -> Option<u32> {
        self.state.lock().await.process.id()
    }

    /// Counters of what the session has done so far.
    pub async fn stats(&self) -> SessionStats {
        self.state.lock().await.stats()
    }

    /// Text of the last reported failure.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.deduper.last().map(str::to_string)
    }

    /// Install, build, restart and test. Caller holds the lock.
    async fn cycle(&self, state: &mut SupervisorState, test_target: &str) {
        state.record_cycle();
        let installed = match self.config.install_target(&self.root) {
            Some(target) => Some(self.install(state, &target).await),
            None => None,
        };

        let Some((program, artifact)) = self.binary(state, installed).await else {
            return;
        };

        if self.config.clear {
            display::clear_screen();
        }
        let shown = if artifact.is_some() {
            base_name(&self.root).to_string()
        } else {
            program.to_string_lossy().into_owned()
        };
        match state.process.restart(&program, &self.args).await {
            Ok(pid) => {
                state.record_restart();
                display::print_restart(&shown, pid);
            }
            Err(e) => {
                state.record_launch_failure();
                display::print_launch_failure(&shown, &e);
            }
        }
        drop(artifact);

        if self.config.test {
            self.test(state, test_target).await;
        }
    }

    /// Decide what to launch, or `None` to leave the current process alone.
    ///
    /// `installed` is `None` when no install step ran. When one ran, its
    /// result decides the restart: the install has already compiled the
    /// changed packages, so a following build usually reports nothing.
    /// Without an install step the build's affected packages decide.
    /// Either way a restart always happens when no process is held.
    async fn binary(
        &self,
        state: &mut SupervisorState,
        installed: Option<bool>,
    ) -> Option<(OsString, Option<Artifact>)> {
        let keep_current = state.process.is_running();
        if installed == Some(false) && keep_current {
            tracing::debug!("Nothing installed, not restarting");
            return None;
        }

        match self.config.restart_mode() {
            RestartMode::Command(name) => Some((OsString::from(name), None)),
            RestartMode::Artifact => {
                let result = self.coordinator.build(&self.root).await;
                if let Some(err) = &result.error {
                    self.report(state, Verb::Build, &self.root, err, true);
                    return None;
                }
                if installed.is_none() && result.affected.is_empty() && keep_current {
                    tracing::debug!("Ignoring rebuild with zero affected packages");
                    return None;
                }
                let artifact = result.artifact?;
                Some((artifact.path().as_os_str().to_owned(), Some(artifact)))
            }
        }
    }

    async fn install(&self, state: &mut SupervisorState, target: &str) -> bool {
        tracing::debug!(target, "Installing");
        match self.coordinator.install(target).await {
            Ok(installed) => installed,
            Err(e) => {
                self.report(state, Verb::Install, target, &e, true);
                false
            }
        }
    }

    async fn test(&self, state: &mut SupervisorState, package: &str) {
        tracing::debug!(package, "Testing");
        match self.coordinator.test(package).await {
            Ok(()) => {
                if state.last_test_failed {
                    display::print_tests_passed(package);
                }
                state.last_test_failed = false;
            }
            Err(e) => {
                state.last_test_failed = true;
                self.report(state, Verb::Test, package, &e, false);
            }
        }
    }

    /// Show a failure unless it repeats the last one.
    fn report(
        &self,
        state: &mut SupervisorState,
        verb: Verb,
        target: &str,
        err: &ToolError,
        clear: bool,
    ) {
        let seen = state.deduper.observe(err);
        state.record_failure(seen);
        match seen {
            Seen::Repeat => {
                tracing::debug!(%verb, target, "Suppressing repeated failure");
            }
            Seen::Fresh => {
                if clear && self.config.clear {
                    display::clear_screen();
                }
                display::print_failure(verb, target, err);
            }
        }
    }
}
