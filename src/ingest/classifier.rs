//! Row classification for the categorization workbook.
//!
//! The export has no header schema: label rows repeat the column titles,
//! banner rows open a category section, and data rows are recognised by a
//! numeric request id in column C. Column positions are a fixed contract with
//! the exporting tool and live only in [`cols`].

use crate::model::{Categorization, UNCATEGORIZED};

use super::workbook::{SheetRow, Worksheet, excel_serial_to_datetime};

/// First-cell values of the repeated column-title rows.
pub const LABEL_TOKENS: [&str; 2] = ["Technician", "Técnico"];

/// Section headings written by the export above each group of requests.
pub const CATEGORY_BANNERS: [&str; 10] = [
	"Error de Usuario",
	"Error de Sistema",
	"Error de Datos",
	"Requerimiento",
	"Consulta",
	"Configuración",
	"Accesos",
	"Capacitación",
	"Mejora",
	"Infraestructura",
];

/// Banner text may sit in any of the first six columns. A numeric request id
/// makes the row data even when a text column holds a banner word.
const BANNER_LAST_COL: usize = 5;

/// Column indices of a categorization data row.
pub mod cols {
	pub const TECHNICIAN: usize = 0;
	pub const CREATED_TIME: usize = 1;
	pub const REQUEST_ID: usize = 2;
	pub const MODULO: usize = 3;
	pub const SUBJECT: usize = 4;
	pub const PROBLEM_ID: usize = 5;
	pub const LINKED_REQUEST_ID: usize = 6;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
	Label,
	Banner(&'static str),
	Data,
	Unrecognized,
}

pub fn classify_row(row: &SheetRow) -> RowKind {
	if LABEL_TOKENS.contains(&row.cell(0).trim()) {
		return RowKind::Label;
	}

	if row.number(cols::REQUEST_ID).is_some() {
		return RowKind::Data;
	}

	let banner = row
		.cells
		.iter()
		.take(BANNER_LAST_COL + 1)
		.find_map(|cell| {
			CATEGORY_BANNERS
				.iter()
				.copied()
				.find(|b| *b == cell.trim())
		});
	match banner {
		Some(banner) => RowKind::Banner(banner),
		None => RowKind::Unrecognized,
	}
}

/// Parsed categorization rows plus bookkeeping for the upload log.
#[derive(Debug, Clone, Default)]
pub struct CategorizationSheet {
	pub records: Vec<Categorization>,
	pub banners: usize,
	pub skipped: usize,
}

fn render_created_time(raw: &str) -> String {
	match super::workbook::parse_number(raw).and_then(excel_serial_to_datetime) {
		Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
		None => raw.to_string(),
	}
}

fn link_or_none(link: Option<&str>) -> Option<String> {
	link.map(str::trim)
		.filter(|l| !l.is_empty())
		.map(str::to_string)
}

/// Map one data row to a record. The only place the column contract is read.
pub fn map_categorization(sheet: &Worksheet, row: &SheetRow, category: &str) -> Categorization {
	Categorization {
		request_id: row.cell(cols::REQUEST_ID).to_string(),
		category: category.to_string(),
		technician: row.cell(cols::TECHNICIAN).to_string(),
		created_time: render_created_time(row.cell(cols::CREATED_TIME)),
		modulo: row.cell(cols::MODULO).to_string(),
		subject: row.cell(cols::SUBJECT).to_string(),
		problem_id: row.cell(cols::PROBLEM_ID).to_string(),
		linked_request_id: row.cell(cols::LINKED_REQUEST_ID).to_string(),
		request_link: link_or_none(sheet.hyperlink(row.index, cols::REQUEST_ID)),
		linked_request_link: link_or_none(sheet.hyperlink(row.index, cols::LINKED_REQUEST_ID)),
	}
}

/// Walk the sheet top to bottom, carrying the current banner onto each data row.
pub fn parse_categorizations(sheet: &Worksheet) -> CategorizationSheet {
	let mut out = CategorizationSheet::default();
	let mut current: &str = UNCATEGORIZED;

	for row in &sheet.rows {
		match classify_row(row) {
			RowKind::Label => {}
			RowKind::Banner(banner) => {
				out.banners += 1;
				current = banner;
			}
			RowKind::Data => out.records.push(map_categorization(sheet, row, current)),
			RowKind::Unrecognized => {
				log::debug!("sheet row {} skipped: not a categorization row", row.index + 1);
				out.skipped += 1;
			}
		}
	}

	out
}
