use std::sync::Arc;

use anyhow::Result;
use power_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability,
    pipeline::{IngestEvent, IngestQueue},
    store,
};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = store::connect(&cfg).await?;
    let settings = cfg.ingest.settings()?;

    let (ingest, workers) = IngestQueue::start(Arc::clone(&store), settings);
    spawn_event_log(&ingest);

    let state = AppState::new(store, ingest, settings.offset, cfg.sizing.round_amounts);
    let app = api::router(state, cfg.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", cfg.server.bind_addr))?;
    tracing::info!(addr = %cfg.server.bind_addr, workers = settings.workers, "power service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handles; wait for queued files.
    tracing::info!("http server stopped, draining ingest queue");
    workers.await?;
    Ok(())
}

/// Keeps a summary of every finished job in the log.
fn spawn_event_log(ingest: &IngestQueue) {
    let mut events = ingest.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(IngestEvent::Completed { job_id, company, report }) => {
                    tracing::info!(job_id, company = %company, days_kept = report.days_kept, "ingest job completed");
                }
                // Already logged with full context by the worker.
                Ok(IngestEvent::Failed { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "ingest event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
