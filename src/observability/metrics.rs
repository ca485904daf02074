use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

const NAMESPACE: &str = "opsreport";

/// Prometheus metrics for the import pipeline. Every series is labelled by
/// the report kind (`categorizations`, `war_rooms`, `request_tags`).
pub struct MetricsRegistry {
	registry: Registry,

	pub upload_requests_total: IntCounterVec,
	pub upload_failures_total: IntCounterVec,
	pub records_imported_total: IntCounterVec,
	pub upload_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
	pub fn new() -> prometheus::Result<Self> {
		let registry = Registry::new();

		let upload_requests_total = IntCounterVec::new(
			Opts::new("upload_requests_total", "Workbook uploads received").namespace(NAMESPACE),
			&["kind"],
		)?;

		let upload_failures_total = IntCounterVec::new(
			Opts::new(
				"upload_failures_total",
				"Workbook uploads rejected or failed",
			)
			.namespace(NAMESPACE),
			&["kind"],
		)?;

		let records_imported_total = IntCounterVec::new(
			Opts::new(
				"records_imported_total",
				"Rows written by successful imports",
			)
			.namespace(NAMESPACE),
			&["kind"],
		)?;

		let upload_duration_seconds = HistogramVec::new(
			HistogramOpts::new(
				"upload_duration_seconds",
				"Time spent parsing and reconciling one upload",
			)
			.namespace(NAMESPACE)
			.buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
			&["kind"],
		)?;

		registry.register(Box::new(upload_requests_total.clone()))?;
		registry.register(Box::new(upload_failures_total.clone()))?;
		registry.register(Box::new(records_imported_total.clone()))?;
		registry.register(Box::new(upload_duration_seconds.clone()))?;

		Ok(Self {
			registry,
			upload_requests_total,
			upload_failures_total,
			records_imported_total,
			upload_duration_seconds,
		})
	}

	/// Encode metrics in Prometheus text format
	pub fn encode(&self) -> String {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		match encoder.encode_to_string(&metric_families) {
			Ok(s) => s,
			Err(e) => {
				log::error!("failed to encode metrics: {}", e);
				String::new()
			}
		}
	}
}

pub fn init_metrics() -> anyhow::Result<Arc<MetricsRegistry>> {
	Ok(Arc::new(MetricsRegistry::new()?))
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn labelled_series_show_up_once_touched() {
		let registry = super::MetricsRegistry::new().expect("registry");
		registry
			.upload_requests_total
			.with_label_values(&["war_rooms"])
			.inc();
		registry
			.records_imported_total
			.with_label_values(&["war_rooms"])
			.inc_by(12);

		let text = registry.encode();
		assert!(text.contains("opsreport_upload_requests_total{kind=\"war_rooms\"} 1"));
		assert!(text.contains("opsreport_records_imported_total{kind=\"war_rooms\"} 12"));
	}
}
