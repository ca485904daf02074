//! Import reconciliation: upsert-by-key for categorizations and validated
//! replace-all for war rooms and request tags.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::Serialize;
use thiserror::Error;

use crate::ingest::{ParseError, ParsedReport, ReportKind};
use crate::model::{
	ApplicationInput, Categorization, MappingInput, MatchType, RequestTag, UpsertOutcome, WarRoom,
};
use crate::store::{ReportStore, StoreError};

/// Input rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
	pub message: String,
	/// 1-based sheet rows at fault, when the input came from a workbook.
	pub rows: Vec<usize>,
}

impl ValidationError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			rows: Vec::new(),
		}
	}
}

#[derive(Debug, Error)]
pub enum ImportError {
	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("workbook parser task failed: {0}")]
	Worker(#[from] tokio::task::JoinError),
}

/// Result of one workbook import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ImportSummary {
	Upserted { outcome: UpsertOutcome, total: usize },
	Replaced { imported: u64, total: usize },
}

impl ImportSummary {
	pub fn written(&self) -> u64 {
		match self {
			ImportSummary::Upserted { outcome, .. } => outcome.created + outcome.updated,
			ImportSummary::Replaced { imported, .. } => *imported,
		}
	}
}

/// Records imported with replace-all semantics.
pub trait Replaceable: Clone {
	type Key: Eq + Hash;

	fn natural_key(&self) -> Self::Key;

	/// Names of required fields that are blank.
	fn missing_fields(&self) -> Vec<&'static str>;

	fn source_row(&self) -> usize;
}

impl Replaceable for WarRoom {
	type Key = String;

	fn natural_key(&self) -> String {
		self.incident_id.trim().to_string()
	}

	fn missing_fields(&self) -> Vec<&'static str> {
		let mut missing = Vec::new();
		if self.incident_id.trim().is_empty() {
			missing.push("incidentId");
		}
		if self.application.trim().is_empty() {
			missing.push("application");
		}
		missing
	}

	fn source_row(&self) -> usize {
		self.source_row
	}
}

impl Replaceable for RequestTag {
	type Key = (String, String, String);

	fn natural_key(&self) -> Self::Key {
		(
			self.linked_request_id.clone(),
			self.informacion_adicional.clone(),
			self.categorizacion.clone(),
		)
	}

	fn missing_fields(&self) -> Vec<&'static str> {
		if self.linked_request_id.trim().is_empty() {
			vec!["linkedRequestId"]
		} else {
			Vec::new()
		}
	}

	fn source_row(&self) -> usize {
		self.source_row
	}
}

/// Reject the whole batch if any record lacks a required field.
pub fn validate_required<T: Replaceable>(records: &[T]) -> Result<(), ValidationError> {
	let mut rows = Vec::new();
	let mut fields: Vec<&'static str> = Vec::new();
	for rec in records {
		let missing = rec.missing_fields();
		if missing.is_empty() {
			continue;
		}
		rows.push(rec.source_row() + 1);
		for f in missing {
			if !fields.contains(&f) {
				fields.push(f);
			}
		}
	}

	if rows.is_empty() {
		return Ok(());
	}
	let listed: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
	Err(ValidationError {
		message: format!(
			"{} row(s) missing required fields ({}): rows {}",
			rows.len(),
			fields.join(", "),
			listed.join(", ")
		),
		rows,
	})
}

/// Keep the first record for each natural key.
pub fn dedup_first<T: Replaceable>(records: &[T]) -> Vec<T> {
	let mut seen = HashSet::new();
	let kept: Vec<T> = records
		.iter()
		.filter(|r| seen.insert(r.natural_key()))
		.cloned()
		.collect();
	if kept.len() < records.len() {
		log::debug!("dropped {} duplicate rows", records.len() - kept.len());
	}
	kept
}

/// Collapse repeated request ids to their last occurrence, at the position of
/// the first.
pub fn dedup_last(records: Vec<Categorization>) -> Vec<Categorization> {
	let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
	let mut out: Vec<Categorization> = Vec::with_capacity(records.len());
	for rec in records {
		match index.get(&rec.request_id) {
			Some(&i) => out[i] = rec,
			None => {
				index.insert(rec.request_id.clone(), out.len());
				out.push(rec);
			}
		}
	}
	out
}

pub async fn upsert_categorizations<S: ReportStore + ?Sized>(
	store: &S,
	records: Vec<Categorization>,
	batch_size: usize,
) -> Result<ImportSummary, ImportError> {
	let total = records.len();
	let unique = dedup_last(records);
	let outcome = store.upsert_categorizations(&unique, batch_size).await?;
	log::info!(
		"categorizations upserted: {} created, {} updated, {} parsed",
		outcome.created,
		outcome.updated,
		total
	);
	Ok(ImportSummary::Upserted { outcome, total })
}

pub async fn import_war_rooms<S: ReportStore + ?Sized>(
	store: &S,
	records: Vec<WarRoom>,
	batch_size: usize,
) -> Result<ImportSummary, ImportError> {
	validate_required(&records)?;
	let total = records.len();
	let unique = dedup_first(&records);
	let imported = store.replace_war_rooms(&unique, batch_size).await?;
	log::info!("war rooms replaced: {} of {} imported", imported, total);
	Ok(ImportSummary::Replaced { imported, total })
}

pub async fn import_request_tags<S: ReportStore + ?Sized>(
	store: &S,
	records: Vec<RequestTag>,
	batch_size: usize,
) -> Result<ImportSummary, ImportError> {
	validate_required(&records)?;
	let total = records.len();
	let unique = dedup_first(&records);
	let imported = store.replace_request_tags(&unique, batch_size).await?;
	log::info!("request tags replaced: {} of {} imported", imported, total);
	Ok(ImportSummary::Replaced { imported, total })
}

/// Parse `bytes` on the blocking pool and reconcile the records into `store`.
pub async fn import_workbook<S: ReportStore + ?Sized>(
	store: &S,
	kind: ReportKind,
	bytes: Vec<u8>,
	batch_size: usize,
) -> Result<ImportSummary, ImportError> {
	let parsed =
		tokio::task::spawn_blocking(move || crate::ingest::parse_report(kind, &bytes)).await??;

	match parsed {
		ParsedReport::Categorizations(sheet) => {
			upsert_categorizations(store, sheet.records, batch_size).await
		}
		ParsedReport::WarRooms(rows) => import_war_rooms(store, rows, batch_size).await,
		ParsedReport::RequestTags(rows) => import_request_tags(store, rows, batch_size).await,
	}
}

pub fn validate_application(input: &ApplicationInput) -> Result<(), ValidationError> {
	if input.code.trim().is_empty() {
		return Err(ValidationError::new("application code is required"));
	}
	if input.name.trim().is_empty() {
		return Err(ValidationError::new("application name is required"));
	}
	for p in &input.patterns {
		if p.pattern.trim().is_empty() {
			return Err(ValidationError::new("pattern text is required"));
		}
		if p.match_type == MatchType::Regex {
			crate::matching::compile_regex(p.pattern.trim()).map_err(|e| {
				ValidationError::new(format!("invalid regex '{}': {}", p.pattern, e))
			})?;
		}
	}
	Ok(())
}

pub fn validate_mapping(input: &MappingInput) -> Result<(), ValidationError> {
	if input.source_value.trim().is_empty() {
		return Err(ValidationError::new("sourceValue is required"));
	}
	if input.display_value.trim().is_empty() {
		return Err(ValidationError::new("displayValue is required"));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::PatternInput;
	use crate::store::MemoryStore;

	fn room(id: &str, app: &str, row: usize) -> WarRoom {
		WarRoom {
			incident_id: id.into(),
			application: app.into(),
			date: Some(45300.0),
			start_time: None,
			end_time: None,
			duration_minutes: None,
			participants: None,
			status: String::new(),
			notes: String::new(),
			rca_status: String::new(),
			rca_link: None,
			source_row: row,
		}
	}

	fn cat(id: &str, category: &str) -> Categorization {
		Categorization {
			request_id: id.into(),
			category: category.into(),
			technician: String::new(),
			created_time: String::new(),
			modulo: String::new(),
			subject: String::new(),
			problem_id: String::new(),
			linked_request_id: String::new(),
			request_link: None,
			linked_request_link: None,
		}
	}

	#[test]
	fn validation_lists_offending_rows() {
		let rows = vec![room("INC-1", "SAP", 2), room("", "SAP", 3), room("INC-3", " ", 4)];
		let err = validate_required(&rows).unwrap_err();
		assert_eq!(err.rows, vec![4, 5]);
		assert!(err.message.contains("incidentId"));
		assert!(err.message.contains("application"));
	}

	#[test]
	fn first_occurrence_wins_for_replace_all() {
		let rows = vec![room("INC-1", "SAP", 1), room("INC-1", "CRM", 2), room("INC-2", "SAP", 3)];
		let kept = dedup_first(&rows);
		assert_eq!(kept.len(), 2);
		assert_eq!(kept[0].application, "SAP");
	}

	#[test]
	fn last_occurrence_wins_for_upsert() {
		let rows = vec![cat("7", "Consulta"), cat("8", "Consulta"), cat("7", "Mejora")];
		let kept = dedup_last(rows);
		assert_eq!(kept.len(), 2);
		assert_eq!(kept[0].request_id, "7");
		assert_eq!(kept[0].category, "Mejora");
	}

	#[tokio::test]
	async fn invalid_import_leaves_previous_rows() {
		let store = MemoryStore::new();
		import_war_rooms(&store, vec![room("INC-1", "SAP", 1)], 20)
			.await
			.unwrap();

		let err = import_war_rooms(&store, vec![room("INC-2", "SAP", 1), room("INC-3", "", 2)], 20)
			.await
			.unwrap_err();
		assert!(matches!(err, ImportError::Validation(_)));

		let rooms = store.list_war_rooms(&Default::default()).await.unwrap();
		assert_eq!(rooms.len(), 1);
		assert_eq!(rooms[0].incident_id, "INC-1");
	}

	#[tokio::test]
	async fn duplicate_incidents_import_fewer_than_total() {
		let store = MemoryStore::new();
		let summary = import_war_rooms(
			&store,
			vec![room("INC-1", "SAP", 1), room("INC-1", "SAP", 2), room("INC-2", "CRM", 3)],
			1,
		)
		.await
		.unwrap();
		assert_eq!(summary, ImportSummary::Replaced { imported: 2, total: 3 });
	}

	#[tokio::test]
	async fn reimport_updates_instead_of_duplicating() {
		let store = MemoryStore::new();
		let rows = vec![cat("1", "Consulta"), cat("2", "Consulta")];
		upsert_categorizations(&store, rows.clone(), 20).await.unwrap();
		let again = upsert_categorizations(&store, rows, 20).await.unwrap();
		assert_eq!(
			again,
			ImportSummary::Upserted {
				outcome: UpsertOutcome { created: 0, updated: 2 },
				total: 2
			}
		);
	}

	#[test]
	fn rejects_bad_regex_patterns() {
		let input = ApplicationInput {
			code: "SAP".into(),
			name: "SAP".into(),
			description: None,
			is_active: true,
			patterns: vec![PatternInput {
				pattern: "sap(".into(),
				priority: 1,
				match_type: MatchType::Regex,
				is_active: true,
			}],
		};
		assert!(validate_application(&input).is_err());
	}
}
