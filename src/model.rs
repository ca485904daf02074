//! Domain records shared by the import pipeline, the stores, and the API.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Category assigned to data rows that appear before any banner row.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Placeholder the spreadsheet producer writes when a request has no link or tag.
pub const NOT_ASSIGNED: &str = "No asignado";

/// One support request as exported to the categorization workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
	pub request_id: String,
	pub category: String,
	pub technician: String,
	pub created_time: String,
	pub modulo: String,
	pub subject: String,
	pub problem_id: String,
	pub linked_request_id: String,
	pub request_link: Option<String>,
	pub linked_request_link: Option<String>,
}

/// One incident war-room session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarRoom {
	pub incident_id: String,
	pub application: String,
	/// Excel serial day number.
	pub date: Option<f64>,
	/// Fraction of a day.
	pub start_time: Option<f64>,
	pub end_time: Option<f64>,
	pub duration_minutes: Option<f64>,
	pub participants: Option<i32>,
	pub status: String,
	pub notes: String,
	pub rca_status: String,
	pub rca_link: Option<String>,
	/// 0-based sheet row the record was read from; not persisted.
	#[serde(skip)]
	pub source_row: usize,
}

/// A tag row relating a linked request to extra information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTag {
	pub linked_request_id: String,
	pub informacion_adicional: String,
	pub categorizacion: String,
	#[serde(skip)]
	pub source_row: usize,
}

/// A categorization row joined to at most one request tag. The join multiplies
/// rows; `projections::with_additional_info` folds them back.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedCategorization {
	pub categorization: Categorization,
	pub informacion_adicional: Option<String>,
	pub categorizacion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
	pub category: String,
	pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLink {
	pub request_id: String,
	pub request_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UpsertOutcome {
	pub created: u64,
	pub updated: u64,
}

/// Half-open range of Excel serial days, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WarRoomFilter {
	pub date_from: Option<f64>,
	pub date_to: Option<f64>,
}

impl WarRoomFilter {
	pub fn matches(&self, room: &WarRoom) -> bool {
		match (self.date_from, self.date_to, room.date) {
			(None, None, _) => true,
			(_, _, None) => false,
			(from, to, Some(d)) => from.is_none_or(|f| d >= f) && to.is_none_or(|t| d < t),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
	Exact,
	Contains,
	StartsWith,
	Regex,
}

impl MatchType {
	pub fn as_str(&self) -> &'static str {
		match self {
			MatchType::Exact => "exact",
			MatchType::Contains => "contains",
			MatchType::StartsWith => "starts_with",
			MatchType::Regex => "regex",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"exact" => Some(MatchType::Exact),
			"contains" => Some(MatchType::Contains),
			"starts_with" => Some(MatchType::StartsWith),
			"regex" => Some(MatchType::Regex),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
	pub id: i64,
	pub pattern: String,
	pub priority: i32,
	pub match_type: MatchType,
	pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
	pub id: i64,
	pub code: String,
	pub name: String,
	pub description: Option<String>,
	pub is_active: bool,
	pub patterns: Vec<Pattern>,
}

fn default_true() -> bool {
	true
}

fn default_priority() -> i32 {
	100
}

fn default_match_type() -> MatchType {
	MatchType::Contains
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInput {
	pub pattern: String,
	#[serde(default = "default_priority")]
	pub priority: i32,
	#[serde(default = "default_match_type")]
	pub match_type: MatchType,
	#[serde(default = "default_true")]
	pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInput {
	pub code: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default = "default_true")]
	pub is_active: bool,
	#[serde(default)]
	pub patterns: Vec<PatternInput>,
}

/// Which source-to-label dictionary a mapping belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingKind {
	Categorization,
	Module,
}

impl MappingKind {
	pub fn table(&self) -> &'static str {
		match self {
			MappingKind::Categorization => "categorization_mappings",
			MappingKind::Module => "module_mappings",
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			MappingKind::Categorization => "categorization mapping",
			MappingKind::Module => "module mapping",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
	pub id: i64,
	pub source_value: String,
	pub display_value: String,
	pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingInput {
	pub source_value: String,
	pub display_value: String,
	#[serde(default = "default_true")]
	pub is_active: bool,
}

/// Orders request ids the way the SQL `ORDER BY length(id), id` does, which
/// is numeric order for digit strings without leading zeros.
pub fn request_id_order(a: &str, b: &str) -> Ordering {
	a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_ids_sort_numerically() {
		let mut ids = vec!["100", "9", "25", "1000", "11"];
		ids.sort_by(|a, b| request_id_order(a, b));
		assert_eq!(ids, vec!["9", "11", "25", "100", "1000"]);
	}

	#[test]
	fn war_room_filter_is_half_open() {
		let filter = WarRoomFilter {
			date_from: Some(45292.0),
			date_to: Some(45323.0),
		};
		let mut room = WarRoom {
			incident_id: "INC1".into(),
			application: "SAP".into(),
			date: Some(45292.0),
			start_time: None,
			end_time: None,
			duration_minutes: None,
			participants: None,
			status: String::new(),
			notes: String::new(),
			rca_status: String::new(),
			rca_link: None,
			source_row: 0,
		};
		assert!(filter.matches(&room));
		room.date = Some(45323.0);
		assert!(!filter.matches(&room));
		room.date = None;
		assert!(!filter.matches(&room));
		assert!(WarRoomFilter::default().matches(&room));
	}

	#[test]
	fn match_type_names_round_trip_through_serde() {
		let parsed: MatchType = serde_json::from_str("\"starts_with\"").expect("parse");
		assert_eq!(parsed, MatchType::StartsWith);
		assert_eq!(MatchType::parse(parsed.as_str()), Some(parsed));
	}
}
