//! onchange - rebuild, test and restart a Go program when its sources change.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use onchange::config::{ConfigError, ConfigLoader, OnchangeConfig};
use onchange::supervisor::{EventLoop, Session};
use onchange::toolchain::GoTool;
use onchange::watcher::{ChangeFilter, FilterError, FsWatcher, WatcherError};

#[derive(Parser, Debug)]
#[command(
    name = "onchange",
    about = "Rebuild, test and restart a Go program when its sources change",
    version
)]
struct Cli {
    /// Regexp matched against changed file paths.
    #[arg(short = 'f', value_name = "PATTERN")]
    pattern: Option<String>,

    /// Install packages on change.
    #[arg(
        short = 'i',
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    install: Option<bool>,

    /// Run tests on change.
    #[arg(
        short = 't',
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    test: Option<bool>,

    /// Clear the terminal on restart.
    #[arg(
        short = 'c',
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    clear: Option<bool>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Run this binary from the search path instead of the freshly built one.
    #[arg(long, value_name = "NAME")]
    restart_command: Option<String>,

    /// The go tool to invoke.
    #[arg(long = "go", value_name = "PATH")]
    go_binary: Option<String>,

    /// Debounce window for file events, in milliseconds.
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Read configuration from this file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Import path of the package to build and run.
    package: String,

    /// Arguments passed to the supervised process.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    /// Overlay command-line flags on the file configuration.
    fn apply(&self, mut config: OnchangeConfig) -> OnchangeConfig {
        if let Some(pattern) = &self.pattern {
            config.pattern.clone_from(pattern);
        }
        if let Some(install) = self.install {
            config.install = install;
        }
        if let Some(test) = self.test {
            config.test = test;
        }
        if let Some(clear) = self.clear {
            config.clear = clear;
        }
        if self.verbose > 0 {
            config.verbose = true;
        }
        if let Some(name) = &self.restart_command {
            config.restart_command = Some(name.clone());
        }
        if let Some(go) = &self.go_binary {
            config.go_binary.clone_from(go);
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        config
    }

    fn loader(&self) -> ConfigLoader {
        match &self.config {
            Some(path) => ConfigLoader::with_path(path.clone()),
            None => ConfigLoader::new(),
        }
    }
}

/// Errors that abort startup.
#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn supervise(
    package: String,
    args: Vec<String>,
    config: OnchangeConfig,
) -> Result<(), StartupError> {
    let filter = ChangeFilter::new(&config.pattern)?;
    let (watcher, events) = FsWatcher::new(config.debounce())?;
    let toolchain = Arc::new(GoTool::new(config.go_binary.clone()));

    tracing::info!(
        package = %package,
        go = %toolchain.program(),
        pattern = %filter.pattern(),
        install = config.install,
        test = config.test,
        restart = ?config.restart_mode(),
        "Starting onchange"
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let session = Arc::new(Session::new(
        config,
        package,
        args,
        toolchain,
        Arc::new(watcher),
    ));
    session.start().await?;
    session.initial_cycle().await;

    EventLoop::new(session, filter).run(events, cancel).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.loader().load() {
        Ok(config) => cli.apply(config),
        Err(e) => {
            eprintln!("onchange: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cli.verbose.max(u8::from(config.verbose)));

    match supervise(cli.package, cli.args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("onchange: {e}");
            ExitCode::FAILURE
        }
    }
}
