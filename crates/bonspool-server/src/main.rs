// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonspool: receipt print spool.
//
// Entry point. Initialises logging, resolves the data directory, loads
// configuration, opens the stores and serves the API until Ctrl-C.

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use bonspool_core::error::Result;
use bonspool_server::services::app_services::load_config;
use bonspool_server::services::data_dir::data_dir;
use bonspool_server::{SpoolServices, router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Bonspool starting");

    if let Err(e) = run().await {
        error!(error = %e, "Bonspool stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let dir = data_dir()?;
    let config = load_config(&dir);
    let services = SpoolServices::init(&dir, config)?;
    let sweep = services.spawn_retention_sweep();

    let addr = services.config().listen_addr.clone();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, service_id = %services.config().service_id, "listening");

    axum::serve(listener, router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    info!("Bonspool stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
