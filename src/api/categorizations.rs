use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use super::envelope::{self, Deleted};
use crate::error::AppError;
use crate::ingest::ReportKind;
use crate::projections;
use crate::reconcile::ImportSummary;
use crate::state::AppState;
use crate::store::ReportStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
	records_created: u64,
	records_updated: u64,
	total_records: usize,
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	let rows = state.store.list_categorizations_joined().await?;
	Ok(envelope::success(projections::with_additional_info(rows)))
}

pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	Ok(envelope::success(state.store.category_summary().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdsQuery {
	linked_request_id: Option<String>,
	categorizacion: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
		.ok_or_else(|| AppError::BadRequest(format!("query parameter '{}' is required", name)))
}

pub async fn request_ids(
	State(state): State<AppState>,
	Query(q): Query<RequestIdsQuery>,
) -> Result<impl IntoResponse, AppError> {
	let linked = required(q.linked_request_id, "linkedRequestId")?;
	let categorizacion = required(q.categorizacion, "categorizacion")?;
	let links = state.store.request_ids_by_tag(&linked, &categorizacion).await?;
	Ok(envelope::success(links))
}

pub async fn upload(
	State(state): State<AppState>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
	let summary = super::upload::import_upload(&state, ReportKind::Categorizations, multipart).await?;
	let ImportSummary::Upserted { outcome, total } = summary else {
		return Err(AppError::Internal(
			"categorization import did not upsert".to_string(),
		));
	};
	Ok(envelope::success(UpsertResponse {
		records_created: outcome.created,
		records_updated: outcome.updated,
		total_records: total,
	}))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	let deleted = state.store.delete_all_categorizations().await?;
	log::info!("deleted {} categorizations", deleted);
	Ok(envelope::success(Deleted {
		message: format!("{} categorizations deleted", deleted),
		deleted,
	}))
}
