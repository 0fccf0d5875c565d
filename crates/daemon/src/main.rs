// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fledge Scheduler Daemon (fledged)
//!
//! Background process that runs scheduled tasks until SIGTERM or SIGINT.

use std::path::PathBuf;

use fledge_daemon::{startup, LifecycleError, Paths};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let paths = Paths::resolve(std::env::args_os().nth(1).map(PathBuf::from))?;

    // Write startup marker to log (before tracing setup)
    write_startup_marker(&paths)?;

    let log_guard = setup_logging(&paths)?;

    info!(data_dir = %paths.data_dir.display(), "starting fledged");

    let daemon = match startup(&paths).await {
        Ok(d) => d,
        Err(e) => {
            // Written synchronously; the non-blocking writer may not flush
            write_startup_error(&paths, &e);
            error!(error = %e, "failed to start scheduler");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Signal ready for the parent process
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    if let Err(e) = daemon.shutdown().await {
        error!(error = %e, "shutdown failed");
        return Err(e.into());
    }

    info!("fledged stopped");
    Ok(())
}

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- fledged: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- fledged: starting (pid: ";

fn write_startup_marker(paths: &Paths) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

fn write_startup_error(paths: &Paths, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start scheduler: {}", error);
}

fn setup_logging(
    paths: &Paths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = paths.log_path.parent().ok_or(LifecycleError::NoDataDir)?;
    let file_name = paths.log_path.file_name().ok_or(LifecycleError::NoDataDir)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
