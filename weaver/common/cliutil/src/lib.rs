// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Startup and shutdown shared by weaver's command-line binaries.
//!
//! The resolver is a single-shot tool, so this stays deliberately small:
//! one entry point that installs the tracing subscriber from a couple of
//! environment variables, echoes the invocation, runs the real main, and
//! turns a failure into a uniform fatal report and exit code.

use std::fmt::Debug;
use std::path::Path;
use std::process::{ExitCode, Termination};

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::Layer;

/// Set to `0` to silence log output on stderr.
pub const CONSOLE_LOG_ENV: &str = "WEAVER_LOG_CONSOLE";

/// When set, log output is also written to this file, without ANSI colors.
pub const LOG_FILE_ENV: &str = "WEAVER_LOG_FILE";

/// Runs a binary's real main with the common scaffolding around it.
///
/// Call this as the only statement of `main`. A failed logging setup is
/// reported but does not prevent the run; a failed `main` is printed as a
/// fatal error and mapped to a failure exit code.
pub fn cli_main<F, T, E>(main: F) -> ExitCode
where
    F: FnOnce() -> Result<T, E>,
    T: Termination,
    E: Debug,
{
    if let Err(error) = init_logging() {
        eprintln!("warning: {}: {error:#}", program_name());
    }
    tracing::info!(
        "COMMAND: {}",
        std::env::args()
            .map(|arg| shell_escape::escape(arg.into()))
            .join(" ")
    );

    match main() {
        Ok(value) => value.report(),
        Err(error) => {
            eprintln!("FATAL: {}: {error:?}", program_name());
            ExitCode::FAILURE
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Stderr gets colored output filtered by `RUST_LOG` (default `info`)
/// unless [`CONSOLE_LOG_ENV`] is `0`; [`LOG_FILE_ENV`] adds a plain-text
/// copy of the same stream.
fn init_logging() -> Result<()> {
    let mut layers = Vec::new();

    if std::env::var(CONSOLE_LOG_ENV).as_deref() != Ok("0") {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(std::io::stderr)
                .with_filter(env_filter()?)
                .boxed(),
        );
    }

    if let Some(path) = std::env::var_os(LOG_FILE_ENV) {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to open log file {path:?}"))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file)
                .with_filter(env_filter()?)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("a global tracing subscriber is already installed")
}

fn env_filter() -> Result<EnvFilter> {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()
        .context("invalid RUST_LOG filter")
}

fn program_name() -> String {
    std::env::args()
        .next()
        .map(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or(arg0)
        })
        .unwrap_or_else(|| "weaver".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A process can install the global subscriber once, so everything that
    // needs it lives in this single test.
    #[test]
    fn log_file_receives_filtered_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log_file = dir.path().join("weaver.log");
        std::env::set_var(LOG_FILE_ENV, &log_file);
        std::env::set_var(CONSOLE_LOG_ENV, "0");
        std::env::set_var("RUST_LOG", "info");

        init_logging()?;
        tracing::info!("resolved 4 modules");
        tracing::debug!("noisy detail");

        let contents = std::fs::read_to_string(&log_file)?;
        assert!(contents.contains("resolved 4 modules"));
        assert!(!contents.contains("noisy detail"));
        Ok(())
    }
}
