use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{RegistryStore, ReportStore, StoreError};
use crate::model::{
	Application, ApplicationInput, Categorization, CategorySummary, JoinedCategorization,
	Mapping, MappingInput, MappingKind, NOT_ASSIGNED, Pattern, RequestLink, RequestTag,
	UpsertOutcome, WarRoom, WarRoomFilter, request_id_order,
};

#[derive(Default)]
struct Inner {
	categorizations: HashMap<String, Categorization>,
	war_rooms: Vec<WarRoom>,
	request_tags: Vec<RequestTag>,
	applications: Vec<Application>,
	mappings: HashMap<MappingKind, Vec<Mapping>>,
	last_id: i64,
	fail_writes: bool,
}

impl Inner {
	fn next_id(&mut self) -> i64 {
		self.last_id += 1;
		self.last_id
	}

	fn check_writable(&self) -> Result<(), StoreError> {
		if self.fail_writes {
			return Err(StoreError::Database(sqlx::Error::PoolClosed));
		}
		Ok(())
	}

	fn sorted_categorizations(&self) -> Vec<&Categorization> {
		let mut rows: Vec<&Categorization> = self.categorizations.values().collect();
		rows.sort_by(|a, b| request_id_order(&a.request_id, &b.request_id));
		rows
	}

	fn build_patterns(&mut self, input: &ApplicationInput) -> Vec<Pattern> {
		let mut patterns: Vec<Pattern> = input
			.patterns
			.iter()
			.map(|p| Pattern {
				id: self.next_id(),
				pattern: p.pattern.trim().to_string(),
				priority: p.priority,
				match_type: p.match_type,
				is_active: p.is_active,
			})
			.collect();
		patterns.sort_by_key(|p| (p.priority, p.id));
		patterns
	}
}

fn joinable(linked_request_id: &str) -> bool {
	!linked_request_id.is_empty() && linked_request_id != NOT_ASSIGNED
}

/// In-process store with the same observable semantics as [`super::PgStore`].
/// Used by `serve --in-memory` and the router tests.
#[derive(Default)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make every subsequent write fail with a database error.
	pub async fn fail_writes(&self, fail: bool) {
		self.inner.lock().await.fail_writes = fail;
	}
}

#[async_trait]
impl ReportStore for MemoryStore {
	async fn ping(&self) -> Result<(), StoreError> {
		Ok(())
	}

	async fn upsert_categorizations(
		&self,
		records: &[Categorization],
		_batch_size: usize,
	) -> Result<UpsertOutcome, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;

		let mut outcome = UpsertOutcome::default();
		for rec in records {
			if inner
				.categorizations
				.insert(rec.request_id.clone(), rec.clone())
				.is_some()
			{
				outcome.updated += 1;
			} else {
				outcome.created += 1;
			}
		}
		Ok(outcome)
	}

	async fn list_categorizations_joined(&self) -> Result<Vec<JoinedCategorization>, StoreError> {
		let inner = self.inner.lock().await;
		let mut out = Vec::new();
		for cat in inner.sorted_categorizations() {
			let tags: Vec<&RequestTag> = if joinable(&cat.linked_request_id) {
				inner
					.request_tags
					.iter()
					.filter(|t| t.linked_request_id == cat.linked_request_id)
					.collect()
			} else {
				Vec::new()
			};

			if tags.is_empty() {
				out.push(JoinedCategorization {
					categorization: cat.clone(),
					informacion_adicional: None,
					categorizacion: None,
				});
			}
			for tag in tags {
				out.push(JoinedCategorization {
					categorization: cat.clone(),
					informacion_adicional: Some(tag.informacion_adicional.clone()),
					categorizacion: Some(tag.categorizacion.clone()),
				});
			}
		}
		Ok(out)
	}

	async fn category_summary(&self) -> Result<Vec<CategorySummary>, StoreError> {
		let inner = self.inner.lock().await;
		let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
		for cat in inner.categorizations.values() {
			*counts.entry(cat.category.as_str()).or_default() += 1;
		}
		Ok(counts
			.into_iter()
			.map(|(category, count)| CategorySummary {
				category: category.to_string(),
				count,
			})
			.collect())
	}

	async fn request_ids_by_tag(
		&self,
		linked_request_id: &str,
		categorizacion: &str,
	) -> Result<Vec<RequestLink>, StoreError> {
		let inner = self.inner.lock().await;
		let tagged = inner
			.request_tags
			.iter()
			.any(|t| t.linked_request_id == linked_request_id && t.categorizacion == categorizacion);
		if !tagged {
			return Ok(Vec::new());
		}

		Ok(inner
			.sorted_categorizations()
			.into_iter()
			.filter(|c| c.linked_request_id == linked_request_id)
			.map(|c| RequestLink {
				request_id: c.request_id.clone(),
				request_link: c.request_link.clone(),
			})
			.collect())
	}

	async fn delete_all_categorizations(&self) -> Result<u64, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let removed = inner.categorizations.len() as u64;
		inner.categorizations.clear();
		Ok(removed)
	}

	async fn replace_war_rooms(
		&self,
		records: &[WarRoom],
		_batch_size: usize,
	) -> Result<u64, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		inner.war_rooms = records.to_vec();
		Ok(records.len() as u64)
	}

	async fn list_war_rooms(&self, filter: &WarRoomFilter) -> Result<Vec<WarRoom>, StoreError> {
		let inner = self.inner.lock().await;
		let mut rooms: Vec<WarRoom> = inner
			.war_rooms
			.iter()
			.filter(|r| filter.matches(r))
			.cloned()
			.collect();
		// newest first, undated last
		rooms.sort_by(|a, b| match (a.date, b.date) {
			(Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.incident_id.cmp(&b.incident_id)),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => a.incident_id.cmp(&b.incident_id),
		});
		Ok(rooms)
	}

	async fn count_war_rooms(&self, filter: &WarRoomFilter) -> Result<i64, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.war_rooms.iter().filter(|r| filter.matches(r)).count() as i64)
	}

	async fn delete_all_war_rooms(&self) -> Result<u64, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let removed = inner.war_rooms.len() as u64;
		inner.war_rooms.clear();
		Ok(removed)
	}

	async fn replace_request_tags(
		&self,
		records: &[RequestTag],
		_batch_size: usize,
	) -> Result<u64, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		inner.request_tags = records.to_vec();
		Ok(records.len() as u64)
	}

	async fn list_request_tags(&self) -> Result<Vec<RequestTag>, StoreError> {
		Ok(self.inner.lock().await.request_tags.clone())
	}

	async fn delete_all_request_tags(&self) -> Result<u64, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let removed = inner.request_tags.len() as u64;
		inner.request_tags.clear();
		Ok(removed)
	}
}

fn code_taken(apps: &[Application], code: &str, except: Option<i64>) -> bool {
	apps.iter()
		.any(|a| Some(a.id) != except && a.code.eq_ignore_ascii_case(code.trim()))
}

fn source_taken(mappings: &[Mapping], source: &str, except: Option<i64>) -> bool {
	mappings
		.iter()
		.any(|m| Some(m.id) != except && m.source_value == source.trim())
}

#[async_trait]
impl RegistryStore for MemoryStore {
	async fn list_applications(&self) -> Result<Vec<Application>, StoreError> {
		Ok(self.inner.lock().await.applications.clone())
	}

	async fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.applications.iter().find(|a| a.id == id).cloned())
	}

	async fn find_application_by_code(
		&self,
		code: &str,
	) -> Result<Option<Application>, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner
			.applications
			.iter()
			.find(|a| a.code.eq_ignore_ascii_case(code.trim()))
			.cloned())
	}

	async fn create_application(
		&self,
		input: &ApplicationInput,
	) -> Result<Application, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		if code_taken(&inner.applications, &input.code, None) {
			return Err(StoreError::Conflict(format!(
				"application code '{}' already exists",
				input.code
			)));
		}

		let id = inner.next_id();
		let patterns = inner.build_patterns(input);
		let app = Application {
			id,
			code: input.code.trim().to_string(),
			name: input.name.trim().to_string(),
			description: input.description.clone(),
			is_active: input.is_active,
			patterns,
		};
		inner.applications.push(app.clone());
		Ok(app)
	}

	async fn update_application(
		&self,
		id: i64,
		input: &ApplicationInput,
	) -> Result<Option<Application>, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		if !inner.applications.iter().any(|a| a.id == id) {
			return Ok(None);
		}
		if code_taken(&inner.applications, &input.code, Some(id)) {
			return Err(StoreError::Conflict(format!(
				"application code '{}' already exists",
				input.code
			)));
		}

		let patterns = inner.build_patterns(input);
		let Some(app) = inner.applications.iter_mut().find(|a| a.id == id) else {
			return Ok(None);
		};
		app.code = input.code.trim().to_string();
		app.name = input.name.trim().to_string();
		app.description = input.description.clone();
		app.is_active = input.is_active;
		app.patterns = patterns;
		Ok(Some(app.clone()))
	}

	async fn delete_application(&self, id: i64) -> Result<bool, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let before = inner.applications.len();
		inner.applications.retain(|a| a.id != id);
		Ok(inner.applications.len() != before)
	}

	async fn list_mappings(&self, kind: MappingKind) -> Result<Vec<Mapping>, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.mappings.get(&kind).cloned().unwrap_or_default())
	}

	async fn get_mapping(&self, kind: MappingKind, id: i64) -> Result<Option<Mapping>, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner
			.mappings
			.get(&kind)
			.and_then(|ms| ms.iter().find(|m| m.id == id))
			.cloned())
	}

	async fn create_mapping(
		&self,
		kind: MappingKind,
		input: &MappingInput,
	) -> Result<Mapping, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let taken = inner
			.mappings
			.get(&kind)
			.is_some_and(|ms| source_taken(ms, &input.source_value, None));
		if taken {
			return Err(StoreError::Conflict(format!(
				"{} for '{}' already exists",
				kind.label(),
				input.source_value
			)));
		}

		let mapping = Mapping {
			id: inner.next_id(),
			source_value: input.source_value.trim().to_string(),
			display_value: input.display_value.trim().to_string(),
			is_active: input.is_active,
		};
		inner.mappings.entry(kind).or_default().push(mapping.clone());
		Ok(mapping)
	}

	async fn update_mapping(
		&self,
		kind: MappingKind,
		id: i64,
		input: &MappingInput,
	) -> Result<Option<Mapping>, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let ms = inner.mappings.entry(kind).or_default();
		if !ms.iter().any(|m| m.id == id) {
			return Ok(None);
		}
		if source_taken(ms, &input.source_value, Some(id)) {
			return Err(StoreError::Conflict(format!(
				"{} for '{}' already exists",
				kind.label(),
				input.source_value
			)));
		}

		let Some(mapping) = ms.iter_mut().find(|m| m.id == id) else {
			return Ok(None);
		};
		mapping.source_value = input.source_value.trim().to_string();
		mapping.display_value = input.display_value.trim().to_string();
		mapping.is_active = input.is_active;
		Ok(Some(mapping.clone()))
	}

	async fn delete_mapping(&self, kind: MappingKind, id: i64) -> Result<bool, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.check_writable()?;
		let Some(ms) = inner.mappings.get_mut(&kind) else {
			return Ok(false);
		};
		let before = ms.len();
		ms.retain(|m| m.id != id);
		Ok(ms.len() != before)
	}
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use crate::model::{MatchType, PatternInput};

	fn cat(id: &str, linked: &str) -> Categorization {
		Categorization {
			request_id: id.into(),
			category: "Consulta".into(),
			technician: "ana".into(),
			created_time: String::new(),
			modulo: String::new(),
			subject: String::new(),
			problem_id: String::new(),
			linked_request_id: linked.into(),
			request_link: Some(format!("https://sd.local/{}", id)),
			linked_request_link: None,
		}
	}

	fn tag(linked: &str, info: &str, c: &str) -> RequestTag {
		RequestTag {
			linked_request_id: linked.into(),
			informacion_adicional: info.into(),
			categorizacion: c.into(),
			source_row: 0,
		}
	}

	#[tokio::test]
	async fn upsert_reports_created_then_updated() {
		let store = MemoryStore::new();
		let first = store
			.upsert_categorizations(&[cat("1", ""), cat("2", "")], 20)
			.await
			.unwrap();
		assert_eq!(first, UpsertOutcome { created: 2, updated: 0 });

		let second = store
			.upsert_categorizations(&[cat("2", ""), cat("3", "")], 20)
			.await
			.unwrap();
		assert_eq!(second, UpsertOutcome { created: 1, updated: 1 });
	}

	#[tokio::test]
	async fn joined_listing_multiplies_rows_per_tag_and_skips_sentinels() {
		let store = MemoryStore::new();
		store
			.upsert_categorizations(&[cat("10", "500"), cat("9", NOT_ASSIGNED)], 20)
			.await
			.unwrap();
		store
			.replace_request_tags(
				&[
					tag("500", "VIP", "Urgente"),
					tag("500", "Legal", "Urgente"),
					tag(NOT_ASSIGNED, "x", "y"),
				],
				20,
			)
			.await
			.unwrap();

		let rows = store.list_categorizations_joined().await.unwrap();
		let got: Vec<(&str, Option<&str>)> = rows
			.iter()
			.map(|r| (r.categorization.request_id.as_str(), r.informacion_adicional.as_deref()))
			.collect();
		assert_eq!(got, vec![("9", None), ("10", Some("VIP")), ("10", Some("Legal"))]);
	}

	#[tokio::test]
	async fn request_ids_by_tag_orders_numerically() {
		let store = MemoryStore::new();
		store
			.upsert_categorizations(&[cat("100", "7"), cat("20", "7"), cat("3", "8")], 20)
			.await
			.unwrap();
		store
			.replace_request_tags(&[tag("7", "", "Urgente")], 20)
			.await
			.unwrap();

		let ids: Vec<String> = store
			.request_ids_by_tag("7", "Urgente")
			.await
			.unwrap()
			.into_iter()
			.map(|l| l.request_id)
			.collect();
		assert_eq!(ids, vec!["20", "100"]);
		assert!(store.request_ids_by_tag("7", "Otro").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn failed_write_leaves_previous_rows() {
		let store = MemoryStore::new();
		store
			.replace_request_tags(&[tag("1", "a", "b")], 20)
			.await
			.unwrap();
		store.fail_writes(true).await;
		assert!(store.replace_request_tags(&[], 20).await.is_err());
		assert_eq!(store.list_request_tags().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn application_codes_are_unique_case_insensitively() {
		let store = MemoryStore::new();
		let input = ApplicationInput {
			code: "SAP".into(),
			name: "SAP ERP".into(),
			description: None,
			is_active: true,
			patterns: vec![PatternInput {
				pattern: "sap".into(),
				priority: 10,
				match_type: MatchType::Contains,
				is_active: true,
			}],
		};
		let app = store.create_application(&input).await.unwrap();
		assert_eq!(app.patterns.len(), 1);

		let dup = ApplicationInput {
			code: "sap".into(),
			..input.clone()
		};
		assert!(matches!(
			store.create_application(&dup).await,
			Err(StoreError::Conflict(_))
		));
		// renaming to its own code is fine
		assert!(store.update_application(app.id, &dup).await.unwrap().is_some());
		assert!(store.update_application(999, &input).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn mappings_are_kept_per_kind() {
		let store = MemoryStore::new();
		let input = MappingInput {
			source_value: "FI".into(),
			display_value: "Finanzas".into(),
			is_active: true,
		};
		store.create_mapping(MappingKind::Module, &input).await.unwrap();
		store
			.create_mapping(MappingKind::Categorization, &input)
			.await
			.unwrap();
		assert!(matches!(
			store.create_mapping(MappingKind::Module, &input).await,
			Err(StoreError::Conflict(_))
		));
		assert_eq!(store.list_mappings(MappingKind::Module).await.unwrap().len(), 1);
	}
}
