//! Usage Ledger - Binary Entry Point
//!
//! Composition root: reads configuration, opens the store, serves the
//! metrics API, then drains pending writes and closes the store on shutdown.

use std::sync::Arc;

use tracing::{info, warn};

use usage_ledger::api::{create_router, AppState};
use usage_ledger::config::{self, ServiceConfig};
use usage_ledger::event_store::UsageStore;
use usage_ledger::ingest::{Sha256KeyHasher, UsageRecorder};
use usage_ledger::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&config::log_config_from_env());
    let config = ServiceConfig::from_env();

    let store = if config.stats_enabled {
        Some(Arc::new(UsageStore::open(config.store.clone())))
    } else {
        info!("usage statistics disabled");
        None
    };

    let recorder = UsageRecorder::new(store.clone(), Arc::new(Sha256KeyHasher));
    let state = Arc::new(AppState::new(store.clone(), recorder.clone()));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, version = usage_ledger::VERSION, "usage server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Writes accepted just before shutdown must reach the buffer before the final flush
    recorder.drain().await;
    if let Some(store) = store {
        store.close().await?;
    }

    info!("usage server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
