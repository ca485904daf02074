pub mod classifier;
pub mod format_detection;
pub mod hyperlinks;
pub mod request_tags;
pub mod war_rooms;
pub mod workbook;

use thiserror::Error;

use crate::model::{RequestTag, WarRoom};

pub use classifier::{CategorizationSheet, parse_categorizations};
pub use format_detection::{WorkbookFormat, detect_workbook_format};
pub use request_tags::parse_request_tags;
pub use war_rooms::parse_war_rooms;
pub use workbook::{SheetRow, Worksheet, read_first_sheet, read_sheet};

/// Failures turning uploaded bytes into worksheet rows.
#[derive(Debug, Error)]
pub enum ParseError {
	#[error("file content is not an Excel workbook")]
	NotAWorkbook,

	#[error("failed to open Excel workbook: {0}")]
	Workbook(String),

	#[error("Excel workbook has no sheets")]
	NoSheets,

	#[error("worksheet '{0}' not found")]
	SheetNotFound(String),

	#[error("failed to read hyperlinks: {0}")]
	Hyperlinks(String),

	#[error("no {0} rows found in worksheet '{1}'")]
	NoRecords(&'static str, String),
}

/// Report kinds that can be imported from a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
	Categorizations,
	WarRooms,
	RequestTags,
}

impl ReportKind {
	/// Metric label and log name.
	pub fn as_str(&self) -> &'static str {
		match self {
			ReportKind::Categorizations => "categorizations",
			ReportKind::WarRooms => "war_rooms",
			ReportKind::RequestTags => "request_tags",
		}
	}
}

/// Typed records mapped from one uploaded workbook.
#[derive(Debug, Clone)]
pub enum ParsedReport {
	Categorizations(CategorizationSheet),
	WarRooms(Vec<WarRoom>),
	RequestTags(Vec<RequestTag>),
}

impl ParsedReport {
	pub fn len(&self) -> usize {
		match self {
			ParsedReport::Categorizations(sheet) => sheet.records.len(),
			ParsedReport::WarRooms(rows) => rows.len(),
			ParsedReport::RequestTags(rows) => rows.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Read the first worksheet and map it as `kind`. A sheet without a single
/// data row is rejected as an empty workbook.
pub fn parse_report(kind: ReportKind, bytes: &[u8]) -> Result<ParsedReport, ParseError> {
	let sheet = read_first_sheet(bytes)?;
	log::debug!(
		"sheet '{}': {} rows, {} hyperlinks",
		sheet.name,
		sheet.rows.len(),
		sheet.hyperlink_count()
	);
	let parsed = match kind {
		ReportKind::Categorizations => {
			let parsed = parse_categorizations(&sheet);
			log::debug!(
				"sheet '{}': {} categorizations, {} banners, {} rows skipped",
				sheet.name,
				parsed.records.len(),
				parsed.banners,
				parsed.skipped
			);
			ParsedReport::Categorizations(parsed)
		}
		ReportKind::WarRooms => ParsedReport::WarRooms(parse_war_rooms(&sheet)),
		ReportKind::RequestTags => ParsedReport::RequestTags(parse_request_tags(&sheet)),
	};

	if parsed.is_empty() {
		return Err(ParseError::NoRecords(kind.as_str(), sheet.name));
	}
	Ok(parsed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_xlsxwriter::Workbook;

	fn workbook(rows: &[&[&str]]) -> Vec<u8> {
		let mut wb = Workbook::new();
		let ws = wb.add_worksheet();
		for (r, cells) in rows.iter().enumerate() {
			for (c, value) in cells.iter().enumerate() {
				match value.parse::<f64>() {
					Ok(n) => ws.write_number(r as u32, c as u16, n).unwrap(),
					Err(_) => ws.write_string(r as u32, c as u16, *value).unwrap(),
				};
			}
		}
		wb.save_to_buffer().unwrap()
	}

	#[test]
	fn header_only_sheet_is_an_empty_workbook() {
		let bytes = workbook(&[&["Fecha", "Incidente", "Aplicación"]]);
		let err = parse_report(ReportKind::WarRooms, &bytes).unwrap_err();
		assert!(matches!(err, ParseError::NoRecords("war_rooms", _)));
	}

	#[test]
	fn maps_rows_by_kind() {
		let bytes = workbook(&[&["Solicitud", "Info", "Tag"], &["54000", "VIP", "Urgente"]]);
		match parse_report(ReportKind::RequestTags, &bytes).unwrap() {
			ParsedReport::RequestTags(tags) => assert_eq!(tags[0].categorizacion, "Urgente"),
			other => panic!("unexpected {:?}", other),
		}
	}
}
