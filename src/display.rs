//! Colored CLI display utilities for supervisor output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal between restarts of the supervised process.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::supervisor::SpawnError;
use crate::toolchain::{ToolError, Verb};

/// ANSI sequence clearing the screen and homing the cursor.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Clear the terminal.
pub fn clear_screen() {
    print!("{CLEAR_SCREEN}");
    let _ = io::stdout().flush();
}

/// Label for a failed tool invocation, e.g. `[BUILD FAILED]`.
#[must_use]
pub fn failure_label(verb: Verb) -> String {
    format!("[{} FAILED]", verb.as_str().to_uppercase())
}

/// Print a failed build, install or test with the tool's output.
pub fn print_failure(verb: Verb, target: &str, err: &ToolError) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(
        stderr,
        "{} {} {}",
        timestamp().dimmed(),
        failure_label(verb).red().bold(),
        target.cyan()
    );
    let body = err.captured().map_or_else(|| err.to_string(), str::to_string);
    let _ = writeln!(stderr, "{}", body.trim_end());
    let _ = stderr.flush();
}

/// Print that the supervised process was (re)started.
pub fn print_restart(program: &str, pid: u32) {
    println!(
        "{} {} {} pid={}",
        timestamp().dimmed(),
        "[RESTART]".green().bold(),
        program.cyan(),
        pid.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print that the supervised process could not be launched.
pub fn print_launch_failure(program: &str, err: &SpawnError) {
    eprintln!(
        "{} {} {}: {}",
        timestamp().dimmed(),
        "[LAUNCH FAILED]".red().bold(),
        program.cyan(),
        err
    );
}

/// Print that a package's tests pass again after a failure.
pub fn print_tests_passed(package: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[TEST OK]".green().bold(),
        package.cyan()
    );
    let _ = io::stdout().flush();
}

/// Print the size of the initial watch set.
pub fn print_watching(package: &str, dirs: usize, packages: usize) {
    println!(
        "{} {} {} ({} directories in {} packages)",
        timestamp().dimmed(),
        "[WATCH]".blue().bold(),
        package.cyan(),
        dirs,
        packages
    );
    let _ = io::stdout().flush();
}
