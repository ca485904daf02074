pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
	Application, ApplicationInput, Categorization, CategorySummary, JoinedCategorization,
	Mapping, MappingInput, MappingKind, RequestLink, RequestTag, UpsertOutcome, WarRoom,
	WarRoomFilter,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("migration failed: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	/// A unique column already holds the value.
	#[error("{0}")]
	Conflict(String),

	#[error("corrupt row: {0}")]
	Corrupt(String),
}

/// Report tables written by workbook imports and read by the projections.
#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
	/// Lightweight ping to verify connectivity.
	async fn ping(&self) -> Result<(), StoreError>;

	/// Insert or overwrite by `request_id`. Keys must be unique within `records`.
	async fn upsert_categorizations(
		&self,
		records: &[Categorization],
		batch_size: usize,
	) -> Result<UpsertOutcome, StoreError>;

	/// Categorizations left-joined to request tags, one row per join match,
	/// ordered by request id.
	async fn list_categorizations_joined(&self) -> Result<Vec<JoinedCategorization>, StoreError>;

	async fn category_summary(&self) -> Result<Vec<CategorySummary>, StoreError>;

	async fn request_ids_by_tag(
		&self,
		linked_request_id: &str,
		categorizacion: &str,
	) -> Result<Vec<RequestLink>, StoreError>;

	async fn delete_all_categorizations(&self) -> Result<u64, StoreError>;

	/// Delete every war room and insert `records` in batches, atomically.
	async fn replace_war_rooms(&self, records: &[WarRoom], batch_size: usize)
	-> Result<u64, StoreError>;

	async fn list_war_rooms(&self, filter: &WarRoomFilter) -> Result<Vec<WarRoom>, StoreError>;

	async fn count_war_rooms(&self, filter: &WarRoomFilter) -> Result<i64, StoreError>;

	async fn delete_all_war_rooms(&self) -> Result<u64, StoreError>;

	async fn replace_request_tags(
		&self,
		records: &[RequestTag],
		batch_size: usize,
	) -> Result<u64, StoreError>;

	async fn list_request_tags(&self) -> Result<Vec<RequestTag>, StoreError>;

	async fn delete_all_request_tags(&self) -> Result<u64, StoreError>;
}

/// CRUD registries. `None` / `false` means the id does not exist.
#[async_trait]
pub trait RegistryStore: Send + Sync + 'static {
	async fn list_applications(&self) -> Result<Vec<Application>, StoreError>;

	async fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError>;

	async fn find_application_by_code(&self, code: &str)
	-> Result<Option<Application>, StoreError>;

	async fn create_application(&self, input: &ApplicationInput)
	-> Result<Application, StoreError>;

	/// Replaces the application's fields and its whole pattern list.
	async fn update_application(
		&self,
		id: i64,
		input: &ApplicationInput,
	) -> Result<Option<Application>, StoreError>;

	async fn delete_application(&self, id: i64) -> Result<bool, StoreError>;

	async fn list_mappings(&self, kind: MappingKind) -> Result<Vec<Mapping>, StoreError>;

	async fn get_mapping(&self, kind: MappingKind, id: i64) -> Result<Option<Mapping>, StoreError>;

	async fn create_mapping(
		&self,
		kind: MappingKind,
		input: &MappingInput,
	) -> Result<Mapping, StoreError>;

	async fn update_mapping(
		&self,
		kind: MappingKind,
		id: i64,
		input: &MappingInput,
	) -> Result<Option<Mapping>, StoreError>;

	async fn delete_mapping(&self, kind: MappingKind, id: i64) -> Result<bool, StoreError>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: ReportStore + RegistryStore {}

impl<T: ReportStore + RegistryStore> Store for T {}
