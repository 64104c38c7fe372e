//! PLC runtime core daemon (`oplcd`).
//!
//! Samples physical inputs, runs the control program, writes physical
//! outputs on a strict scan cycle, and exposes the I/O image to Modbus/TCP
//! supervisory clients while the scan engine runs.
//!
//! Configuration is read from `config.ini` (or the path named by
//! `OPLC_CONFIG`); logging verbosity follows `RUST_LOG`, falling back to the
//! config file's `[logging] level`, falling back to `info`.

mod bootstrap;
mod config;
mod custom;
mod error;
mod glue;
mod hardware;
mod modbus;
mod program;
mod scan;
mod services;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Bootstrap step 1 (parse config) has to happen before step 2 (apply its
    // logging level) can mean anything: `tracing_subscriber`'s global
    // subscriber isn't reloadable once installed, so the config file must be
    // read first and its level folded into the fallback filter here.
    let runtime_config = bootstrap::load_config();
    let configured_filter = runtime_config.log_level.map(|level| level.as_filter()).unwrap_or("info");

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true).with_thread_names(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured_filter)))
        .init();

    tracing::info!("starting PLC runtime (oplcd)");
    tracing::info!(version = env!("CARGO_PKG_VERSION"));

    let run = Arc::new(AtomicBool::new(true));
    install_shutdown_handler(Arc::clone(&run));

    bootstrap::run(run, runtime_config).await
}

/// Clears the shared run flag on SIGINT/SIGTERM so every loop (scan engine,
/// Modbus accept loop, services) observes shutdown cooperatively.
fn install_shutdown_handler(run: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }

        run.store(false, Ordering::Relaxed);
    });
}
