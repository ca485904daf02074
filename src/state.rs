use std::sync::Arc;

use crate::observability::MetricsRegistry;
use crate::store::Store;

/// Application state passed to handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
	pub store: Arc<dyn Store>,
	pub metrics: Arc<MetricsRegistry>,
	/// Rows per INSERT statement during imports.
	pub insert_batch_size: usize,
}

impl AppState {
	pub fn new(
		store: Arc<dyn Store>,
		metrics: Arc<MetricsRegistry>,
		insert_batch_size: usize,
	) -> Self {
		Self {
			store,
			metrics,
			insert_batch_size: insert_batch_size.max(1),
		}
	}
}
