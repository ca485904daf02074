use opsreport::observability::{MetricsRegistry, init_metrics};

#[cfg(feature = "unit-tests")]
#[test]
fn test_upload_series_are_labelled_by_kind() {
	let registry = MetricsRegistry::new().expect("registry");
	registry
		.upload_requests_total
		.with_label_values(&["categorizations"])
		.inc();
	registry
		.records_imported_total
		.with_label_values(&["categorizations"])
		.inc_by(5);
	registry
		.upload_failures_total
		.with_label_values(&["request_tags"])
		.inc();

	let output = registry.encode();
	assert!(output.contains("opsreport_upload_requests_total{kind=\"categorizations\"} 1"));
	assert!(output.contains("opsreport_records_imported_total{kind=\"categorizations\"} 5"));
	assert!(output.contains("opsreport_upload_failures_total{kind=\"request_tags\"} 1"));
}

#[cfg(feature = "unit-tests")]
#[test]
fn test_duration_histogram_observes() {
	let registry = init_metrics().expect("metrics");
	registry
		.upload_duration_seconds
		.with_label_values(&["war_rooms"])
		.observe(0.2);

	let output = registry.encode();
	assert!(output.contains("opsreport_upload_duration_seconds_count{kind=\"war_rooms\"} 1"));
}

#[cfg(feature = "unit-tests")]
#[test]
fn test_registries_are_independent() {
	let a = MetricsRegistry::new().expect("registry");
	let b = MetricsRegistry::new().expect("registry");
	a.upload_requests_total.with_label_values(&["war_rooms"]).inc();
	assert!(!b.encode().contains("war_rooms"));
}
