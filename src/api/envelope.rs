//! JSend response envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
pub struct Success<T: Serialize> {
	status: &'static str,
	data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<Success<T>> {
	Json(Success {
		status: "success",
		data,
	})
}

/// `201 Created` with the created entity as `data`.
pub fn created<T: Serialize>(data: T) -> Response {
	(StatusCode::CREATED, success(data)).into_response()
}

/// Client error: `{"status":"fail","data":{"message":..}}`.
pub fn fail(status: StatusCode, message: &str) -> Response {
	(
		status,
		Json(json!({ "status": "fail", "data": { "message": message } })),
	)
		.into_response()
}

/// Server error: `{"status":"error","message":..}`.
pub fn error(status: StatusCode, message: &str) -> Response {
	(
		status,
		Json(json!({ "status": "error", "message": message })),
	)
		.into_response()
}

/// `{message, deleted}` body of the delete-all endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
	pub message: String,
	pub deleted: u64,
}
