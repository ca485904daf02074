pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod matching;
pub mod model;
pub mod observability;
pub mod projections;
pub mod reconcile;
pub mod state;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

pub use api::router;

use crate::config::Settings;
use crate::ingest::{ReportKind, WorkbookFormat};
use crate::observability::MetricsRegistry;
use crate::reconcile::ImportSummary;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};

/// Connect to PostgreSQL and bring the schema up to date.
pub async fn connect_store(settings: &Settings) -> anyhow::Result<PgStore> {
	let store = PgStore::connect(settings.database_url.as_str(), settings.db_max_connections)
		.await
		.with_context(|| {
			format!(
				"failed to connect to database at {}",
				settings.database_url.host_str().unwrap_or("?")
			)
		})?;
	store.migrate().await.context("failed to run migrations")?;
	Ok(store)
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		log::error!("failed to listen for shutdown signal: {}", e);
	}
	log::info!("shutdown requested");
}

/// Serve the API until ctrl-c.
pub async fn run(
	settings: Settings,
	in_memory: bool,
	metrics: Arc<MetricsRegistry>,
) -> anyhow::Result<()> {
	let store: Arc<dyn Store> = if in_memory {
		log::warn!("using the in-memory store; data is lost on exit");
		Arc::new(MemoryStore::new())
	} else {
		Arc::new(connect_store(&settings).await?)
	};

	let state = AppState::new(store, metrics, settings.insert_batch_size);
	let app = router(state, settings.max_upload_bytes);

	let addr = format!("{}:{}", settings.host, settings.port);
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {}", addr))?;
	log::info!("opsreport listening on http://{}", addr);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;
	Ok(())
}

/// Import one workbook from disk, as the upload endpoints would.
pub async fn import_file<S: Store + ?Sized>(
	store: &S,
	kind: ReportKind,
	path: &Path,
	batch_size: usize,
) -> anyhow::Result<ImportSummary> {
	let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
	if WorkbookFormat::from_filename(name).is_none() {
		anyhow::bail!("'{}' is not an .xlsx or .xls file", path.display());
	}
	let bytes = tokio::fs::read(path)
		.await
		.with_context(|| format!("failed to read {}", path.display()))?;
	let summary = reconcile::import_workbook(store, kind, bytes, batch_size).await?;
	Ok(summary)
}
