//! Main entry point for the procview dashboard.
//!
//! This file loads configuration, opens one table per configured channel
//! against the Socket.IO event source, and serves the dashboard until
//! interrupted, releasing every subscription on the way out.

mod api;
mod config;
mod errors;
mod logging;
mod services;

use std::process::ExitCode;
use std::sync::Arc;

use procview_adapters::{EventSource, SocketIoSource};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::api::{dashboard::dashboard_router, AppState};
use crate::config::Config;
use crate::errors::AppError;
use crate::services::{ProcessTable, TableConfig};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(event = "app.failed", error = %err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let source = SocketIoSource::new(&config.source_url)?;
    info!(
        event = "app.starting",
        source = %source.describe(),
        bind = %config.bind,
        tables = config.channels.len(),
    );

    let tables: Vec<Arc<ProcessTable>> = config
        .channels
        .iter()
        .map(|channel| Arc::new(ProcessTable::new(TableConfig::new(*channel))))
        .collect();

    for table in &tables {
        // A table that cannot subscribe still renders, showing why.
        if let Err(err) = table.activate(&source).await {
            warn!(event = "app.table_unavailable", channel = %table.channel(), error = %err);
        }
    }

    let app = dashboard_router(AppState::new(tables.clone()));
    let listener = TcpListener::bind(config.bind).await?;
    info!(event = "app.listening", addr = %config.bind);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    for table in &tables {
        table.deactivate();
    }
    info!(event = "app.stopped");

    served.map_err(AppError::from)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(event = "app.signal_failed", error = %err);
        std::future::pending::<()>().await;
    }
    info!(event = "app.shutdown_requested");
}
