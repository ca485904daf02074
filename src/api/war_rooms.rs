use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use super::envelope::{self, Deleted};
use crate::error::AppError;
use crate::ingest::ReportKind;
use crate::matching::ApplicationMatcher;
use crate::model::{WarRoom, WarRoomFilter};
use crate::projections::{self, WarRoomAnalytics};
use crate::reconcile::ImportSummary;
use crate::state::AppState;
use crate::store::{RegistryStore, ReportStore};

/// `{message, imported, total}` body of the replace-all uploads.
#[derive(Debug, Serialize)]
pub struct ReplaceResponse {
	pub message: String,
	pub imported: u64,
	pub total: usize,
}

impl ReplaceResponse {
	pub fn new(what: &str, summary: ImportSummary) -> Self {
		let (imported, total) = match summary {
			ImportSummary::Replaced { imported, total } => (imported, total),
			ImportSummary::Upserted { outcome, total } => (outcome.created + outcome.updated, total),
		};
		Self {
			message: format!("{} of {} {} imported", imported, total, what),
			imported,
			total,
		}
	}
}

#[derive(Debug, Serialize)]
struct Listing {
	items: Vec<WarRoom>,
	total: i64,
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	let filter = WarRoomFilter::default();
	let (items, total) = futures_util::try_join!(
		state.store.list_war_rooms(&filter),
		state.store.count_war_rooms(&filter)
	)?;
	Ok(envelope::success(Listing { items, total }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
	app: Option<String>,
	month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsResponse {
	month: Option<String>,
	app: Option<String>,
	#[serde(flatten)]
	analytics: WarRoomAnalytics,
}

pub async fn analytics(
	State(state): State<AppState>,
	Query(q): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
	let month = q.month.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
	let app = q.app.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());

	let filter = match &month {
		Some(m) => projections::month_filter(m).ok_or_else(|| {
			AppError::BadRequest(format!("month '{}' is not in YYYY-MM form", m))
		})?,
		None => WarRoomFilter::default(),
	};

	let mut items = state.store.list_war_rooms(&filter).await?;

	if let Some(code) = &app {
		match state.store.find_application_by_code(code).await? {
			Some(target) => {
				let matcher = ApplicationMatcher::new(state.store.list_applications().await?);
				items.retain(|r| matcher.classify(&r.application).is_some_and(|a| a.id == target.id));
			}
			None => {
				log::debug!("application '{}' is not registered; matching raw names", code);
				let wanted = code.to_lowercase();
				items.retain(|r| r.application.trim().to_lowercase() == wanted);
			}
		}
	}

	Ok(envelope::success(AnalyticsResponse {
		month,
		app,
		analytics: projections::war_room_analytics(items),
	}))
}

pub async fn upload(
	State(state): State<AppState>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
	let summary = super::upload::import_upload(&state, ReportKind::WarRooms, multipart).await?;
	Ok(envelope::success(ReplaceResponse::new("war rooms", summary)))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
	let deleted = state.store.delete_all_war_rooms().await?;
	log::info!("deleted {} war rooms", deleted);
	Ok(envelope::success(Deleted {
		message: format!("{} war rooms deleted", deleted),
		deleted,
	}))
}
