use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::ParseError;
use super::format_detection::{WorkbookFormat, detect_workbook_format};
use super::hyperlinks::{CellPos, hyperlink_formula_target, read_package_hyperlinks};

/// One non-blank row of a worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
	/// 0-based row number within the sheet, blank rows included.
	pub index: usize,
	/// Cell text by absolute column (column A is 0). Empty cells are `""`.
	pub cells: Vec<String>,
}

impl SheetRow {
	/// Cell text at `col`, `""` past the end of the row.
	pub fn cell(&self, col: usize) -> &str {
		self.cells.get(col).map(String::as_str).unwrap_or("")
	}

	/// Cell at `col` as a finite number.
	pub fn number(&self, col: usize) -> Option<f64> {
		parse_number(self.cell(col))
	}
}

/// The rows of one worksheet plus the hyperlinks attached to its cells.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
	pub name: String,
	pub rows: Vec<SheetRow>,
	hyperlinks: HashMap<CellPos, String>,
}

impl Worksheet {
	pub fn new(name: impl Into<String>, rows: Vec<SheetRow>) -> Self {
		Self {
			name: name.into(),
			rows,
			hyperlinks: HashMap::new(),
		}
	}

	pub fn with_hyperlink(mut self, row: usize, col: usize, target: impl Into<String>) -> Self {
		self.hyperlinks.insert((row, col), target.into());
		self
	}

	/// Link target embedded in the cell at `(row, col)`, if any.
	pub fn hyperlink(&self, row: usize, col: usize) -> Option<&str> {
		self.hyperlinks.get(&(row, col)).map(String::as_str)
	}

	pub fn hyperlink_count(&self) -> usize {
		self.hyperlinks.len()
	}
}

pub fn parse_number(s: &str) -> Option<f64> {
	let s = s.trim();
	if s.is_empty() {
		return None;
	}
	s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn render_float(f: f64) -> String {
	if f.fract() == 0.0 && f.abs() < 1e15 {
		format!("{}", f as i64)
	} else {
		f.to_string()
	}
}

fn render_cell(cell: &Data) -> String {
	match cell {
		Data::Empty | Data::Error(_) => String::new(),
		Data::String(s) => s.trim().to_string(),
		Data::Int(i) => i.to_string(),
		Data::Float(f) => render_float(*f),
		Data::Bool(b) => b.to_string(),
		Data::DateTime(dt) => render_float(dt.as_f64()),
		Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
	}
}

/// Convert an Excel serial day (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
	if !serial.is_finite() || serial < 0.0 {
		return None;
	}
	let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
	let millis = (serial * 86_400_000.0).round() as i64;
	epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Inverse of [`excel_serial_to_datetime`] for whole days.
pub fn date_to_excel_serial(date: NaiveDate) -> Option<f64> {
	let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
	Some((date - epoch).num_days() as f64)
}

/// Read the first worksheet of a workbook buffer.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Worksheet, ParseError> {
	read_sheet(bytes, None)
}

/// Read worksheet `name` (or the first one) of a workbook buffer. Fully blank
/// rows are dropped; remaining rows keep their absolute sheet coordinates so
/// hyperlinks can be looked up by `(row.index, col)`.
pub fn read_sheet(bytes: &[u8], name: Option<&str>) -> Result<Worksheet, ParseError> {
	let format = detect_workbook_format(bytes).ok_or(ParseError::NotAWorkbook)?;

	let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
		.map_err(|e| ParseError::Workbook(e.to_string()))?;

	let sheet_names = workbook.sheet_names().to_vec();
	let sheet_name = match name {
		Some(wanted) => sheet_names
			.iter()
			.find(|n| n.as_str() == wanted)
			.cloned()
			.ok_or_else(|| ParseError::SheetNotFound(wanted.to_string()))?,
		None => sheet_names.first().cloned().ok_or(ParseError::NoSheets)?,
	};

	let range = workbook
		.worksheet_range(&sheet_name)
		.map_err(|e| ParseError::Workbook(e.to_string()))?;

	let (row_offset, col_offset) = range
		.start()
		.map(|(r, c)| (r as usize, c as usize))
		.unwrap_or((0, 0));

	let mut rows = Vec::new();
	for (i, raw) in range.rows().enumerate() {
		let mut cells = vec![String::new(); col_offset];
		cells.extend(raw.iter().map(render_cell));
		if cells.iter().all(|c| c.is_empty()) {
			continue;
		}
		rows.push(SheetRow {
			index: row_offset + i,
			cells,
		});
	}

	let mut sheet = Worksheet::new(sheet_name, rows);

	match workbook.worksheet_formula(&sheet.name) {
		Ok(formulas) => {
			let (fr, fc) = formulas
				.start()
				.map(|(r, c)| (r as usize, c as usize))
				.unwrap_or((0, 0));
			for (r, c, formula) in formulas.cells() {
				if let Some(target) = hyperlink_formula_target(formula) {
					sheet.hyperlinks.insert((fr + r, fc + c), target);
				}
			}
		}
		Err(e) => log::debug!("no formulas read from '{}': {}", sheet.name, e),
	}

	if format == WorkbookFormat::Xlsx {
		match read_package_hyperlinks(bytes, &sheet.name) {
			Ok(links) => sheet.hyperlinks.extend(links),
			Err(e) => log::warn!("hyperlinks of '{}' skipped: {}", sheet.name, e),
		}
	}

	log::debug!(
		"read sheet '{}': {} rows, {} hyperlinks",
		sheet.name,
		sheet.rows.len(),
		sheet.hyperlinks.len()
	);

	Ok(sheet)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_xlsxwriter::Workbook;

	#[test]
	fn serial_dates() {
		let dt = excel_serial_to_datetime(45292.5).expect("date");
		assert_eq!(dt.to_string(), "2024-01-01 12:00:00");
		let day = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
		assert_eq!(date_to_excel_serial(day), Some(45292.0));
		assert_eq!(excel_serial_to_datetime(f64::NAN), None);
	}

	#[test]
	fn numbers_must_be_finite() {
		assert_eq!(parse_number(" 12 "), Some(12.0));
		assert_eq!(parse_number("inf"), None);
		assert_eq!(parse_number("NaN"), None);
		assert_eq!(parse_number(""), None);
		assert_eq!(parse_number("REQ-1"), None);
	}

	#[test]
	fn rejects_bytes_that_are_not_a_workbook() {
		let err = read_first_sheet(b"request,category\n1,x\n").unwrap_err();
		assert!(matches!(err, ParseError::NotAWorkbook));
	}

	#[test]
	fn rejects_a_corrupt_package() {
		let err = read_first_sheet(&[0x50, 0x4b, 0x03, 0x04, 0, 0, 0, 0]).unwrap_err();
		assert!(matches!(err, ParseError::Workbook(_)));
	}

	#[test]
	fn reads_rows_with_absolute_coordinates_and_links() {
		let mut workbook = Workbook::new();
		let sheet = workbook.add_worksheet();
		sheet.set_name("Export").expect("name");
		sheet.write_string(1, 1, "  padded  ").expect("write");
		sheet.write_number(1, 2, 1234.0).expect("write");
		sheet.write_number(3, 2, 0.25).expect("write");
		sheet
			.write_url(3, 3, "https://sd.local/WorkOrder.do?id=9&mode=view")
			.expect("write");
		let bytes = workbook.save_to_buffer().expect("save");

		let ws = read_first_sheet(&bytes).expect("read");
		assert_eq!(ws.name, "Export");
		// row 0 and row 2 are blank and skipped
		assert_eq!(ws.rows.len(), 2);
		assert_eq!(ws.rows[0].index, 1);
		assert_eq!(ws.rows[0].cells[0], "");
		assert_eq!(ws.rows[0].cell(1), "padded");
		assert_eq!(ws.rows[0].cell(2), "1234");
		assert_eq!(ws.rows[1].index, 3);
		assert_eq!(ws.rows[1].cell(2), "0.25");
		assert_eq!(ws.rows[1].cell(40), "");
		assert_eq!(
			ws.hyperlink(3, 3),
			Some("https://sd.local/WorkOrder.do?id=9&mode=view")
		);
		assert_eq!(ws.hyperlink(1, 2), None);
	}

	#[test]
	fn designated_sheet_must_exist() {
		let mut workbook = Workbook::new();
		workbook.add_worksheet().write_string(0, 0, "x").expect("write");
		let bytes = workbook.save_to_buffer().expect("save");

		let err = read_sheet(&bytes, Some("Missing")).unwrap_err();
		assert!(matches!(err, ParseError::SheetNotFound(name) if name == "Missing"));
		assert!(read_sheet(&bytes, Some("Sheet1")).is_ok());
	}
}
