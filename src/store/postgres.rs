use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{RegistryStore, ReportStore, StoreError};
use crate::model::{
	Application, ApplicationInput, Categorization, CategorySummary, JoinedCategorization,
	Mapping, MappingInput, MappingKind, MatchType, NOT_ASSIGNED, Pattern, RequestLink, RequestTag,
	UpsertOutcome, WarRoom, WarRoomFilter,
};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres caps one statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Rows per multi-row INSERT: the configured batch size, bounded so that
/// `columns` binds per row stay under the parameter limit.
fn rows_per_statement(batch_size: usize, columns: usize) -> usize {
	batch_size.clamp(1, MAX_BIND_PARAMS / columns.max(1))
}

const CATEGORIZATION_COLUMNS: &str = "c.request_id, c.category, c.technician, c.created_time, \
	c.modulo, c.subject, c.problem_id, c.linked_request_id, c.request_link, c.linked_request_link";

const WAR_ROOM_COLUMNS: &str = "incident_id, application, session_date, start_time, end_time, \
	duration_minutes, participants, status, notes, rca_status, rca_link";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
	pool: PgPool,
}

impl PgStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.connect(database_url)
			.await?;
		Ok(Self::new(pool))
	}

	/// Apply the embedded schema migrations.
	pub async fn migrate(&self) -> Result<(), StoreError> {
		sqlx::migrate!("./migrations").run(&self.pool).await?;
		Ok(())
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	async fn load_patterns(
		&self,
		application_id: Option<i64>,
	) -> Result<HashMap<i64, Vec<Pattern>>, StoreError> {
		let rows = sqlx::query(
			"SELECT id, application_id, pattern, priority, match_type, is_active \
			 FROM application_patterns \
			 WHERE ($1::bigint IS NULL OR application_id = $1) \
			 ORDER BY priority, id",
		)
		.bind(application_id)
		.fetch_all(&self.pool)
		.await?;

		let mut out: HashMap<i64, Vec<Pattern>> = HashMap::new();
		for row in rows {
			let app_id: i64 = row.try_get("application_id")?;
			out.entry(app_id).or_default().push(pattern_from_row(&row)?);
		}
		Ok(out)
	}

	async fn fetch_application(&self, id: i64) -> Result<Option<Application>, StoreError> {
		let row = sqlx::query(
			"SELECT id, code, name, description, is_active FROM applications WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};
		let mut patterns = self.load_patterns(Some(id)).await?;
		Ok(Some(application_from_row(
			&row,
			patterns.remove(&id).unwrap_or_default(),
		)?))
	}
}

fn conflict_or(e: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
	let unique = e
		.as_database_error()
		.and_then(|d| d.code())
		.is_some_and(|code| code == UNIQUE_VIOLATION);
	if unique {
		StoreError::Conflict(message())
	} else {
		StoreError::Database(e)
	}
}

fn categorization_from_row(row: &PgRow) -> Result<Categorization, sqlx::Error> {
	Ok(Categorization {
		request_id: row.try_get("request_id")?,
		category: row.try_get("category")?,
		technician: row.try_get("technician")?,
		created_time: row.try_get("created_time")?,
		modulo: row.try_get("modulo")?,
		subject: row.try_get("subject")?,
		problem_id: row.try_get("problem_id")?,
		linked_request_id: row.try_get("linked_request_id")?,
		request_link: row.try_get("request_link")?,
		linked_request_link: row.try_get("linked_request_link")?,
	})
}

fn war_room_from_row(row: &PgRow) -> Result<WarRoom, sqlx::Error> {
	Ok(WarRoom {
		incident_id: row.try_get("incident_id")?,
		application: row.try_get("application")?,
		date: row.try_get("session_date")?,
		start_time: row.try_get("start_time")?,
		end_time: row.try_get("end_time")?,
		duration_minutes: row.try_get("duration_minutes")?,
		participants: row.try_get("participants")?,
		status: row.try_get("status")?,
		notes: row.try_get("notes")?,
		rca_status: row.try_get("rca_status")?,
		rca_link: row.try_get("rca_link")?,
		source_row: 0,
	})
}

fn pattern_from_row(row: &PgRow) -> Result<Pattern, StoreError> {
	let match_type: String = row.try_get("match_type")?;
	Ok(Pattern {
		id: row.try_get("id")?,
		pattern: row.try_get("pattern")?,
		priority: row.try_get("priority")?,
		match_type: MatchType::parse(&match_type)
			.ok_or_else(|| StoreError::Corrupt(format!("unknown match type '{}'", match_type)))?,
		is_active: row.try_get("is_active")?,
	})
}

fn application_from_row(row: &PgRow, patterns: Vec<Pattern>) -> Result<Application, sqlx::Error> {
	Ok(Application {
		id: row.try_get("id")?,
		code: row.try_get("code")?,
		name: row.try_get("name")?,
		description: row.try_get("description")?,
		is_active: row.try_get("is_active")?,
		patterns,
	})
}

fn mapping_from_row(row: &PgRow) -> Result<Mapping, sqlx::Error> {
	Ok(Mapping {
		id: row.try_get("id")?,
		source_value: row.try_get("source_value")?,
		display_value: row.try_get("display_value")?,
		is_active: row.try_get("is_active")?,
	})
}

// The filter binds are `$1` (inclusive lower) and `$2` (exclusive upper)
const WAR_ROOM_FILTER: &str = "($1::float8 IS NULL OR session_date >= $1) \
	AND ($2::float8 IS NULL OR session_date < $2)";

#[async_trait]
impl ReportStore for PgStore {
	async fn ping(&self) -> Result<(), StoreError> {
		sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
		Ok(())
	}

	async fn upsert_categorizations(
		&self,
		records: &[Categorization],
		batch_size: usize,
	) -> Result<UpsertOutcome, StoreError> {
		let mut outcome = UpsertOutcome::default();
		if records.is_empty() {
			return Ok(outcome);
		}

		let mut tx = self.pool.begin().await?;
		for chunk in records.chunks(rows_per_statement(batch_size, 10)) {
			let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
				"INSERT INTO request_categorizations (request_id, category, technician, \
				 created_time, modulo, subject, problem_id, linked_request_id, request_link, \
				 linked_request_link) ",
			);
			qb.push_values(chunk, |mut b, r| {
				b.push_bind(r.request_id.as_str())
					.push_bind(r.category.as_str())
					.push_bind(r.technician.as_str())
					.push_bind(r.created_time.as_str())
					.push_bind(r.modulo.as_str())
					.push_bind(r.subject.as_str())
					.push_bind(r.problem_id.as_str())
					.push_bind(r.linked_request_id.as_str())
					.push_bind(r.request_link.as_deref())
					.push_bind(r.linked_request_link.as_deref());
			});
			// xmax is 0 only for tuples this statement inserted
			qb.push(
				" ON CONFLICT (request_id) DO UPDATE SET \
				 category = EXCLUDED.category, \
				 technician = EXCLUDED.technician, \
				 created_time = EXCLUDED.created_time, \
				 modulo = EXCLUDED.modulo, \
				 subject = EXCLUDED.subject, \
				 problem_id = EXCLUDED.problem_id, \
				 linked_request_id = EXCLUDED.linked_request_id, \
				 request_link = EXCLUDED.request_link, \
				 linked_request_link = EXCLUDED.linked_request_link, \
				 updated_at = now() \
				 RETURNING (xmax = 0) AS inserted",
			);

			let rows = qb.build().fetch_all(&mut *tx).await?;
			for row in rows {
				if row.try_get::<bool, _>("inserted")? {
					outcome.created += 1;
				} else {
					outcome.updated += 1;
				}
			}
		}
		tx.commit().await?;

		Ok(outcome)
	}

	async fn list_categorizations_joined(&self) -> Result<Vec<JoinedCategorization>, StoreError> {
		let sql = format!(
			"SELECT {cols}, t.informacion_adicional, t.categorizacion \
			 FROM request_categorizations c \
			 LEFT JOIN request_tags t \
			   ON t.linked_request_id = c.linked_request_id \
			  AND c.linked_request_id <> '' \
			  AND c.linked_request_id <> $1 \
			 ORDER BY length(c.request_id), c.request_id, t.id",
			cols = CATEGORIZATION_COLUMNS
		);
		let rows = sqlx::query(&sql)
			.bind(NOT_ASSIGNED)
			.fetch_all(&self.pool)
			.await?;

		let mut out = Vec::with_capacity(rows.len());
		for row in rows {
			out.push(JoinedCategorization {
				categorization: categorization_from_row(&row)?,
				informacion_adicional: row.try_get("informacion_adicional")?,
				categorizacion: row.try_get("categorizacion")?,
			});
		}
		Ok(out)
	}

	async fn category_summary(&self) -> Result<Vec<CategorySummary>, StoreError> {
		let rows: Vec<(String, i64)> = sqlx::query_as(
			"SELECT category, COUNT(*) AS count FROM request_categorizations \
			 GROUP BY category ORDER BY category",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|(category, count)| CategorySummary { category, count })
			.collect())
	}

	async fn request_ids_by_tag(
		&self,
		linked_request_id: &str,
		categorizacion: &str,
	) -> Result<Vec<RequestLink>, StoreError> {
		let rows: Vec<(String, Option<String>)> = sqlx::query_as(
			"SELECT request_id, request_link FROM ( \
			   SELECT DISTINCT c.request_id, c.request_link \
			   FROM request_categorizations c \
			   JOIN request_tags t ON t.linked_request_id = c.linked_request_id \
			   WHERE t.linked_request_id = $1 AND t.categorizacion = $2 \
			 ) tagged \
			 ORDER BY length(request_id), request_id",
		)
		.bind(linked_request_id)
		.bind(categorizacion)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|(request_id, request_link)| RequestLink {
				request_id,
				request_link,
			})
			.collect())
	}

	async fn delete_all_categorizations(&self) -> Result<u64, StoreError> {
		let res = sqlx::query("DELETE FROM request_categorizations")
			.execute(&self.pool)
			.await?;
		Ok(res.rows_affected())
	}

	async fn replace_war_rooms(
		&self,
		records: &[WarRoom],
		batch_size: usize,
	) -> Result<u64, StoreError> {
		let mut tx = self.pool.begin().await?;
		let removed = sqlx::query("DELETE FROM war_rooms").execute(&mut *tx).await?;
		log::debug!("replacing {} war rooms", removed.rows_affected());

		let mut inserted = 0;
		for chunk in records.chunks(rows_per_statement(batch_size, 11)) {
			let mut qb: QueryBuilder<Postgres> =
				QueryBuilder::new(format!("INSERT INTO war_rooms ({}) ", WAR_ROOM_COLUMNS));
			qb.push_values(chunk, |mut b, r| {
				b.push_bind(r.incident_id.as_str())
					.push_bind(r.application.as_str())
					.push_bind(r.date)
					.push_bind(r.start_time)
					.push_bind(r.end_time)
					.push_bind(r.duration_minutes)
					.push_bind(r.participants)
					.push_bind(r.status.as_str())
					.push_bind(r.notes.as_str())
					.push_bind(r.rca_status.as_str())
					.push_bind(r.rca_link.as_deref());
			});
			inserted += qb.build().execute(&mut *tx).await?.rows_affected();
		}
		// dropping an uncommitted transaction rolls it back
		tx.commit().await?;

		Ok(inserted)
	}

	async fn list_war_rooms(&self, filter: &WarRoomFilter) -> Result<Vec<WarRoom>, StoreError> {
		let sql = format!(
			"SELECT {} FROM war_rooms WHERE {} \
			 ORDER BY session_date DESC NULLS LAST, incident_id",
			WAR_ROOM_COLUMNS, WAR_ROOM_FILTER
		);
		let rows = sqlx::query(&sql)
			.bind(filter.date_from)
			.bind(filter.date_to)
			.fetch_all(&self.pool)
			.await?;

		Ok(rows
			.iter()
			.map(war_room_from_row)
			.collect::<Result<Vec<_>, _>>()?)
	}

	async fn count_war_rooms(&self, filter: &WarRoomFilter) -> Result<i64, StoreError> {
		let sql = format!("SELECT COUNT(*) FROM war_rooms WHERE {}", WAR_ROOM_FILTER);
		let count: i64 = sqlx::query_scalar(&sql)
			.bind(filter.date_from)
			.bind(filter.date_to)
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}

	async fn delete_all_war_rooms(&self) -> Result<u64, StoreError> {
		let res = sqlx::query("DELETE FROM war_rooms")
			.execute(&self.pool)
			.await?;
		Ok(res.rows_affected())
	}

	async fn replace_request_tags(
		&self,
		records: &[RequestTag],
		batch_size: usize,
	) -> Result<u64, StoreError> {
		let mut tx = self.pool.begin().await?;
		sqlx::query("DELETE FROM request_tags").execute(&mut *tx).await?;

		let mut inserted = 0;
		for chunk in records.chunks(rows_per_statement(batch_size, 3)) {
			let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
				"INSERT INTO request_tags (linked_request_id, informacion_adicional, categorizacion) ",
			);
			qb.push_values(chunk, |mut b, r| {
				b.push_bind(r.linked_request_id.as_str())
					.push_bind(r.informacion_adicional.as_str())
					.push_bind(r.categorizacion.as_str());
			});
			inserted += qb.build().execute(&mut *tx).await?.rows_affected();
		}
		tx.commit().await?;

		Ok(inserted)
	}

	async fn list_request_tags(&self) -> Result<Vec<RequestTag>, StoreError> {
		let rows: Vec<(String, String, String)> = sqlx::query_as(
			"SELECT linked_request_id, informacion_adicional, categorizacion \
			 FROM request_tags ORDER BY id",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(
				|(linked_request_id, informacion_adicional, categorizacion)| RequestTag {
					linked_request_id,
					informacion_adicional,
					categorizacion,
					source_row: 0,
				},
			)
			.collect())
	}

	async fn delete_all_request_tags(&self) -> Result<u64, StoreError> {
		let res = sqlx::query("DELETE FROM request_tags")
			.execute(&self.pool)
			.await?;
		Ok(res.rows_affected())
	}
}

async fn insert_patterns(
	tx: &mut sqlx::Transaction<'_, Postgres>,
	application_id: i64,
	input: &ApplicationInput,
) -> Result<(), sqlx::Error> {
	if input.patterns.is_empty() {
		return Ok(());
	}
	let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
		"INSERT INTO application_patterns (application_id, pattern, priority, match_type, is_active) ",
	);
	qb.push_values(&input.patterns, |mut b, p| {
		b.push_bind(application_id)
			.push_bind(p.pattern.trim())
			.push_bind(p.priority)
			.push_bind(p.match_type.as_str())
			.push_bind(p.is_active);
	});
	qb.build().execute(&mut **tx).await?;
	Ok(())
}

#[async_trait]
impl RegistryStore for PgStore {
	async fn list_applications(&self) -> Result<Vec<Application>, StoreError> {
		let rows = sqlx::query(
			"SELECT id, code, name, description, is_active FROM applications ORDER BY id",
		)
		.fetch_all(&self.pool)
		.await?;
		let mut patterns = self.load_patterns(None).await?;

		let mut out = Vec::with_capacity(rows.len());
		for row in rows {
			let id: i64 = row.try_get("id")?;
			out.push(application_from_row(
				&row,
				patterns.remove(&id).unwrap_or_default(),
			)?);
		}
		Ok(out)
	}

	async fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError> {
		self.fetch_application(id).await
	}

	async fn find_application_by_code(
		&self,
		code: &str,
	) -> Result<Option<Application>, StoreError> {
		let id: Option<i64> =
			sqlx::query_scalar("SELECT id FROM applications WHERE lower(code) = lower($1)")
				.bind(code.trim())
				.fetch_optional(&self.pool)
				.await?;
		match id {
			Some(id) => self.fetch_application(id).await,
			None => Ok(None),
		}
	}

	async fn create_application(
		&self,
		input: &ApplicationInput,
	) -> Result<Application, StoreError> {
		let mut tx = self.pool.begin().await?;
		let id: i64 = sqlx::query_scalar(
			"INSERT INTO applications (code, name, description, is_active) \
			 VALUES ($1, $2, $3, $4) RETURNING id",
		)
		.bind(input.code.trim())
		.bind(input.name.trim())
		.bind(input.description.as_deref())
		.bind(input.is_active)
		.fetch_one(&mut *tx)
		.await
		.map_err(|e| conflict_or(e, || format!("application code '{}' already exists", input.code)))?;
		insert_patterns(&mut tx, id, input).await?;
		tx.commit().await?;

		self.fetch_application(id)
			.await?
			.ok_or_else(|| StoreError::Corrupt(format!("application {} vanished after insert", id)))
	}

	async fn update_application(
		&self,
		id: i64,
		input: &ApplicationInput,
	) -> Result<Option<Application>, StoreError> {
		let mut tx = self.pool.begin().await?;
		let res = sqlx::query(
			"UPDATE applications SET code = $2, name = $3, description = $4, is_active = $5 \
			 WHERE id = $1",
		)
		.bind(id)
		.bind(input.code.trim())
		.bind(input.name.trim())
		.bind(input.description.as_deref())
		.bind(input.is_active)
		.execute(&mut *tx)
		.await
		.map_err(|e| conflict_or(e, || format!("application code '{}' already exists", input.code)))?;
		if res.rows_affected() == 0 {
			return Ok(None);
		}

		sqlx::query("DELETE FROM application_patterns WHERE application_id = $1")
			.bind(id)
			.execute(&mut *tx)
			.await?;
		insert_patterns(&mut tx, id, input).await?;
		tx.commit().await?;

		self.fetch_application(id).await
	}

	async fn delete_application(&self, id: i64) -> Result<bool, StoreError> {
		let res = sqlx::query("DELETE FROM applications WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(res.rows_affected() > 0)
	}

	async fn list_mappings(&self, kind: MappingKind) -> Result<Vec<Mapping>, StoreError> {
		let sql = format!(
			"SELECT id, source_value, display_value, is_active FROM {} ORDER BY id",
			kind.table()
		);
		let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
		Ok(rows
			.iter()
			.map(mapping_from_row)
			.collect::<Result<Vec<_>, _>>()?)
	}

	async fn get_mapping(&self, kind: MappingKind, id: i64) -> Result<Option<Mapping>, StoreError> {
		let sql = format!(
			"SELECT id, source_value, display_value, is_active FROM {} WHERE id = $1",
			kind.table()
		);
		let row = sqlx::query(&sql)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.as_ref().map(mapping_from_row).transpose()?)
	}

	async fn create_mapping(
		&self,
		kind: MappingKind,
		input: &MappingInput,
	) -> Result<Mapping, StoreError> {
		let sql = format!(
			"INSERT INTO {} (source_value, display_value, is_active) VALUES ($1, $2, $3) \
			 RETURNING id, source_value, display_value, is_active",
			kind.table()
		);
		let row = sqlx::query(&sql)
			.bind(input.source_value.trim())
			.bind(input.display_value.trim())
			.bind(input.is_active)
			.fetch_one(&self.pool)
			.await
			.map_err(|e| {
				conflict_or(e, || {
					format!("{} for '{}' already exists", kind.label(), input.source_value)
				})
			})?;
		Ok(mapping_from_row(&row)?)
	}

	async fn update_mapping(
		&self,
		kind: MappingKind,
		id: i64,
		input: &MappingInput,
	) -> Result<Option<Mapping>, StoreError> {
		let sql = format!(
			"UPDATE {} SET source_value = $2, display_value = $3, is_active = $4 WHERE id = $1 \
			 RETURNING id, source_value, display_value, is_active",
			kind.table()
		);
		let row = sqlx::query(&sql)
			.bind(id)
			.bind(input.source_value.trim())
			.bind(input.display_value.trim())
			.bind(input.is_active)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| {
				conflict_or(e, || {
					format!("{} for '{}' already exists", kind.label(), input.source_value)
				})
			})?;
		Ok(row.as_ref().map(mapping_from_row).transpose()?)
	}

	async fn delete_mapping(&self, kind: MappingKind, id: i64) -> Result<bool, StoreError> {
		let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
		let res = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
		Ok(res.rows_affected() > 0)
	}
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn statement_rows_stay_under_the_bind_limit() {
		assert_eq!(rows_per_statement(500, 11), 500);
		assert_eq!(rows_per_statement(0, 11), 1);
		assert_eq!(rows_per_statement(10_000, 11), 5957);
		assert!(rows_per_statement(usize::MAX, 10) * 10 <= 65535);
		assert_eq!(rows_per_statement(100_000, 3), 21845);
	}
}
