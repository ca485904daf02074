//! CRUD for the application registry and the two mapping dictionaries.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use super::envelope;
use crate::error::AppError;
use crate::matching::ApplicationMatcher;
use crate::model::{Application, ApplicationInput, MappingInput, MappingKind};
use crate::reconcile::{validate_application, validate_mapping};
use crate::state::AppState;
use crate::store::RegistryStore;

fn parse_id(raw: &str) -> Result<i64, AppError> {
	raw.trim()
		.parse()
		.map_err(|_| AppError::BadRequest(format!("id '{}' is not a number", raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
	payload
		.map(|Json(v)| v)
		.map_err(|e| AppError::BadRequest(e.body_text()))
}

fn missing(what: &str, id: i64) -> AppError {
	AppError::NotFound(format!("{} {} not found", what, id))
}

pub async fn list_applications(
	State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
	Ok(envelope::success(state.store.list_applications().await?))
}

pub async fn get_application(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
	let id = parse_id(&id)?;
	let app = state
		.store
		.get_application(id)
		.await?
		.ok_or_else(|| missing("application", id))?;
	Ok(envelope::success(app))
}

pub async fn create_application(
	State(state): State<AppState>,
	payload: Result<Json<ApplicationInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let input = body(payload)?;
	validate_application(&input)?;
	let app = state.store.create_application(&input).await?;
	log::info!("application {} '{}' created", app.id, app.code);
	Ok(envelope::created(app))
}

pub async fn update_application(
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: Result<Json<ApplicationInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let id = parse_id(&id)?;
	let input = body(payload)?;
	validate_application(&input)?;
	let app = state
		.store
		.update_application(id, &input)
		.await?
		.ok_or_else(|| missing("application", id))?;
	Ok(envelope::success(app))
}

pub async fn delete_application(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
	let id = parse_id(&id)?;
	if !state.store.delete_application(id).await? {
		return Err(missing("application", id));
	}
	Ok(envelope::success(serde_json::Value::Null))
}

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
	name: Option<String>,
}

#[derive(Debug, Serialize)]
struct MatchResponse {
	name: String,
	application: Option<Application>,
}

pub async fn match_application(
	State(state): State<AppState>,
	Query(q): Query<MatchQuery>,
) -> Result<impl IntoResponse, AppError> {
	let name = q
		.name
		.filter(|n| !n.trim().is_empty())
		.ok_or_else(|| AppError::BadRequest("query parameter 'name' is required".to_string()))?;
	let matcher = ApplicationMatcher::new(state.store.list_applications().await?);
	let application = matcher.classify(&name).cloned();
	Ok(envelope::success(MatchResponse { name, application }))
}

pub async fn list_mappings(
	State(state): State<AppState>,
	Extension(kind): Extension<MappingKind>,
) -> Result<impl IntoResponse, AppError> {
	Ok(envelope::success(state.store.list_mappings(kind).await?))
}

pub async fn get_mapping(
	State(state): State<AppState>,
	Extension(kind): Extension<MappingKind>,
	Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
	let id = parse_id(&id)?;
	let mapping = state
		.store
		.get_mapping(kind, id)
		.await?
		.ok_or_else(|| missing(kind.label(), id))?;
	Ok(envelope::success(mapping))
}

pub async fn create_mapping(
	State(state): State<AppState>,
	Extension(kind): Extension<MappingKind>,
	payload: Result<Json<MappingInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let input = body(payload)?;
	validate_mapping(&input)?;
	let mapping = state.store.create_mapping(kind, &input).await?;
	Ok(envelope::created(mapping))
}

pub async fn update_mapping(
	State(state): State<AppState>,
	Extension(kind): Extension<MappingKind>,
	Path(id): Path<String>,
	payload: Result<Json<MappingInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
	let id = parse_id(&id)?;
	let input = body(payload)?;
	validate_mapping(&input)?;
	let mapping = state
		.store
		.update_mapping(kind, id, &input)
		.await?
		.ok_or_else(|| missing(kind.label(), id))?;
	Ok(envelope::success(mapping))
}

pub async fn delete_mapping(
	State(state): State<AppState>,
	Extension(kind): Extension<MappingKind>,
	Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
	let id = parse_id(&id)?;
	if !state.store.delete_mapping(kind, id).await? {
		return Err(missing(kind.label(), id));
	}
	Ok(envelope::success(serde_json::Value::Null))
}
