// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-worker — polls the catalog for files waiting in the pagination action
// and runs each through the engine.
//
// Usage: folio-worker [config.json] [catalog.db]
// The catalog path falls back to $FOLIO_DB, then `folio.db`.

use std::sync::Arc;
use std::time::Duration;

use folio_catalog::{QueueCoordinator, SqliteCatalog};
use folio_core::error::Result;
use folio_core::{CancellationToken, EngineConfig, FileQueueRecord, FileStatus, FolioError};
use folio_engine::PaginationEngine;
use tracing::{error, info, warn};

const IDLE_POLL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "worker stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match args.get(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let db_path = args
        .get(2)
        .cloned()
        .or_else(|| std::env::var("FOLIO_DB").ok())
        .unwrap_or_else(|| "folio.db".into());

    let catalog = Arc::new(SqliteCatalog::open(&db_path)?);
    let cancel = CancellationToken::new();
    let engine = Arc::new(
        PaginationEngine::builder(config, Arc::clone(&catalog))
            .cancellation(cancel.clone())
            .build()?,
    );
    let coordinator = QueueCoordinator::new(catalog.clone(), catalog.clone());

    info!(db = %db_path, action = %engine.config().processing_action, "folio worker starting");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    while !cancel.is_cancelled() {
        let action = engine.config().processing_action.clone();
        let claim_from = Arc::clone(&catalog);
        let claimed = spawn_blocking(move || claim_from.claim_next(&action)).await?;

        let Some(record) = claimed else {
            tokio::time::sleep(IDLE_POLL).await;
            continue;
        };

        let worker = Arc::clone(&engine);
        let source = record.clone();
        let outcome = spawn_blocking(move || worker.process_with_report(&source)).await;
        finish(&coordinator, &engine, &record, outcome);
    }

    info!("folio worker stopped");
    Ok(())
}

/// Close out the source in the processing action.
fn finish(
    coordinator: &QueueCoordinator,
    engine: &PaginationEngine,
    record: &FileQueueRecord,
    outcome: Result<folio_engine::ProcessReport>,
) {
    let config = engine.config();
    let mut override_status = false;
    let status = match &outcome {
        Ok(report) if report.rerouted => return,
        Ok(report) => {
            info!(
                file_id = %record.file_id,
                emitted = report.emitted().count(),
                deferred = report.deferred(),
                "source processed"
            );
            FileStatus::Completed
        }
        Err(FolioError::Cancelled) => {
            info!(file_id = %record.file_id, "interrupted, source requeued");
            override_status = true;
            FileStatus::Pending
        }
        Err(err) => {
            error!(file_id = %record.file_id, error = %err, "source failed");
            FileStatus::Failed
        }
    };

    if let Err(err) = coordinator.transition(
        record.file_id,
        &config.processing_action,
        &config.workflow_id,
        status,
        false,
        override_status,
    ) {
        warn!(file_id = %record.file_id, error = %err, "could not close out source");
    }
}

async fn spawn_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FolioError::Assembly(format!("worker task failed: {e}")))?
}
