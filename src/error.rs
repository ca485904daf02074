use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::envelope;
use crate::ingest::ParseError;
use crate::reconcile::{ImportError, ValidationError};
use crate::store::StoreError;

/// Everything a handler can fail with, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum AppError {
	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error(transparent)]
	Store(StoreError),

	#[error("{0}")]
	Internal(String),
}

impl From<StoreError> for AppError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Conflict(msg) => AppError::Conflict(msg),
			other => AppError::Store(other),
		}
	}
}

impl From<ImportError> for AppError {
	fn from(e: ImportError) -> Self {
		match e {
			ImportError::Parse(e) => AppError::Parse(e),
			ImportError::Validation(e) => AppError::Validation(e),
			ImportError::Store(e) => e.into(),
			ImportError::Worker(e) => AppError::Internal(e.to_string()),
		}
	}
}

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			AppError::Parse(_) | AppError::Validation(_) | AppError::BadRequest(_) => {
				StatusCode::BAD_REQUEST
			}
			AppError::NotFound(_) => StatusCode::NOT_FOUND,
			AppError::Conflict(_) => StatusCode::CONFLICT,
			AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = self.to_string();
		if status.is_server_error() {
			log::error!("request failed: {}", message);
			envelope::error(status, &message)
		} else {
			log::warn!("request rejected ({}): {}", status.as_u16(), message);
			envelope::fail(status, &message)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_each_failure_to_its_status() {
		assert_eq!(AppError::from(ParseError::NoSheets).status(), StatusCode::BAD_REQUEST);
		assert_eq!(
			AppError::from(ValidationError::new("x")).status(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			AppError::from(StoreError::Conflict("dup".into())).status(),
			StatusCode::CONFLICT
		);
		assert_eq!(
			AppError::from(StoreError::Database(sqlx::Error::PoolClosed)).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
		assert_eq!(AppError::NotFound("gone".into()).status(), StatusCode::NOT_FOUND);
	}
}
