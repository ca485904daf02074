//! Importing workbooks from disk, as `opsreport import` does.

mod common;

use std::io::Write;

use opsreport::ingest::ReportKind;
use opsreport::model::UpsertOutcome;
use opsreport::reconcile::ImportSummary;
use opsreport::store::{MemoryStore, ReportStore};

#[tokio::test]
async fn imports_each_kind_from_disk() {
	let dir = tempfile::tempdir().expect("tempdir");
	let store = MemoryStore::new();

	let path = dir.path().join("categorizations.xlsx");
	std::fs::File::create(&path)
		.and_then(|mut f| f.write_all(&common::categorization_workbook()))
		.expect("write fixture");
	let summary = opsreport::import_file(&store, ReportKind::Categorizations, &path, 20)
		.await
		.expect("import");
	assert_eq!(
		summary,
		ImportSummary::Upserted {
			outcome: UpsertOutcome { created: 3, updated: 0 },
			total: 3
		}
	);

	let path = dir.path().join("wr.XLSX");
	std::fs::write(&path, common::war_room_workbook(&[(45301.0, "INC-9", "SAP")])).expect("write");
	let summary = opsreport::import_file(&store, ReportKind::WarRooms, &path, 20)
		.await
		.expect("import");
	assert_eq!(summary, ImportSummary::Replaced { imported: 1, total: 1 });

	let path = dir.path().join("tags.xlsx");
	std::fs::write(&path, common::request_tag_workbook()).expect("write");
	opsreport::import_file(&store, ReportKind::RequestTags, &path, 1)
		.await
		.expect("import");
	assert_eq!(store.list_request_tags().await.unwrap().len(), 2);
}

#[tokio::test]
async fn refuses_files_without_a_workbook_extension() {
	let dir = tempfile::tempdir().expect("tempdir");
	let path = dir.path().join("export.csv");
	std::fs::write(&path, common::categorization_workbook()).expect("write");

	let store = MemoryStore::new();
	let err = opsreport::import_file(&store, ReportKind::Categorizations, &path, 20)
		.await
		.unwrap_err();
	assert!(err.to_string().contains("export.csv"));
}
