//! Multipart workbook uploads shared by the three import endpoints.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartRejection;

use crate::error::AppError;
use crate::ingest::{ReportKind, WorkbookFormat};
use crate::reconcile::{self, ImportSummary};
use crate::state::AppState;
use crate::store::Store;

/// Multipart field carrying the workbook.
pub const FILE_FIELD: &str = "file";

#[derive(Debug)]
pub struct Upload {
	pub filename: String,
	pub format: WorkbookFormat,
	pub bytes: Vec<u8>,
}

/// Pull the `file` field out of the form, rejecting anything that is not
/// named like a workbook before its bytes are parsed.
pub async fn read_upload(
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, AppError> {
	let mut multipart =
		multipart.map_err(|e| AppError::BadRequest(format!("expected a multipart form: {}", e)))?;

	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
	{
		if field.name() != Some(FILE_FIELD) {
			continue;
		}

		let filename = field.file_name().unwrap_or_default().to_string();
		let format = WorkbookFormat::from_filename(&filename).ok_or_else(|| {
			AppError::BadRequest(format!(
				"'{}' is not an Excel file; only .xlsx and .xls are accepted",
				filename
			))
		})?;

		let bytes = field
			.bytes()
			.await
			.map_err(|e| AppError::BadRequest(format!("failed to read uploaded file: {}", e)))?;
		if bytes.is_empty() {
			return Err(AppError::BadRequest(format!("'{}' is empty", filename)));
		}

		return Ok(Upload {
			filename,
			format,
			bytes: bytes.to_vec(),
		});
	}

	Err(AppError::BadRequest(format!(
		"no file uploaded; expected multipart field '{}'",
		FILE_FIELD
	)))
}

async fn receive(
	store: &dyn Store,
	kind: ReportKind,
	multipart: Result<Multipart, MultipartRejection>,
	batch_size: usize,
) -> Result<ImportSummary, AppError> {
	let upload = read_upload(multipart).await?;
	log::info!(
		"importing {} from '{}' ({}, {} bytes)",
		kind.as_str(),
		upload.filename,
		upload.format.as_str(),
		upload.bytes.len()
	);
	Ok(reconcile::import_workbook(store, kind, upload.bytes, batch_size).await?)
}

/// Receive, parse, and reconcile one upload, recording upload metrics.
pub async fn import_upload(
	state: &AppState,
	kind: ReportKind,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<ImportSummary, AppError> {
	let labels = [kind.as_str()];
	let metrics = &state.metrics;
	metrics.upload_requests_total.with_label_values(&labels).inc();
	let timer = metrics
		.upload_duration_seconds
		.with_label_values(&labels)
		.start_timer();

	let result = receive(state.store.as_ref(), kind, multipart, state.insert_batch_size).await;
	timer.observe_duration();

	match &result {
		Ok(summary) => metrics
			.records_imported_total
			.with_label_values(&labels)
			.inc_by(summary.written()),
		Err(_) => metrics.upload_failures_total.with_label_values(&labels).inc(),
	}
	result
}
