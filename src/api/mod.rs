//! HTTP surface. Every body is wrapped in the JSend envelope.

pub mod categorizations;
pub mod envelope;
pub mod registry;
pub mod request_tags;
pub mod upload;
pub mod war_rooms;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::health;
use crate::model::MappingKind;
use crate::state::AppState;

fn mapping_routes(prefix: &str, kind: MappingKind) -> Router<AppState> {
	Router::new()
		.route(
			prefix,
			get(registry::list_mappings).post(registry::create_mapping),
		)
		.route(
			&format!("{}/{{id}}", prefix),
			get(registry::get_mapping)
				.put(registry::update_mapping)
				.delete(registry::delete_mapping),
		)
		.layer(Extension(kind))
}

/// Build the full router. Request bodies above `max_upload_bytes` are
/// refused with 413.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
	Router::new()
		.route("/health", get(health::db_health))
		.route("/metrics", get(health::metrics_handler))
		.route(
			"/request-categorization",
			get(categorizations::list).delete(categorizations::delete_all),
		)
		.route(
			"/request-categorization/summary",
			get(categorizations::summary),
		)
		.route(
			"/request-categorization/request-ids",
			get(categorizations::request_ids),
		)
		.route(
			"/request-categorization/upload",
			axum::routing::post(categorizations::upload),
		)
		.route(
			"/request-relationships",
			get(request_tags::list).delete(request_tags::delete_all),
		)
		.route(
			"/request-relationships/upload",
			axum::routing::post(request_tags::upload),
		)
		.route(
			"/war-rooms",
			get(war_rooms::list).delete(war_rooms::delete_all),
		)
		.route("/war-rooms/analytics", get(war_rooms::analytics))
		.route("/war-rooms/upload", axum::routing::post(war_rooms::upload))
		.route(
			"/application-registry",
			get(registry::list_applications).post(registry::create_application),
		)
		.route(
			"/application-registry/match",
			get(registry::match_application),
		)
		.route(
			"/application-registry/{id}",
			get(registry::get_application)
				.put(registry::update_application)
				.delete(registry::delete_application),
		)
		.merge(mapping_routes(
			"/categorization-registry",
			MappingKind::Categorization,
		))
		.merge(mapping_routes("/module-registry", MappingKind::Module))
		.layer(DefaultBodyLimit::disable())
		.layer(RequestBodyLimitLayer::new(max_upload_bytes))
		.layer(CorsLayer::permissive())
		.with_state(state)
}
