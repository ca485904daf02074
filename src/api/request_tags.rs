use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;

use super::envelope::{self, Deleted};
use super::war_rooms::ReplaceResponse;
use crate::error::AppError;
use crate::ingest::ReportKind;
use crate::state::AppState;
use crate::store::ReportStore;

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	Ok(envelope::success(state.store.list_request_tags().await?))
}

pub async fn upload(
	State(state): State<AppState>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
	let summary = super::upload::import_upload(&state, ReportKind::RequestTags, multipart).await?;
	Ok(envelope::success(ReplaceResponse::new("request relationships", summary)))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	let deleted = state.store.delete_all_request_tags().await?;
	Ok(envelope::success(Deleted {
		message: format!("{} request relationships deleted", deleted),
		deleted,
	}))
}
