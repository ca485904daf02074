//! War-room workbook mapping. A data row starts with the session date as an
//! Excel serial number; title and total rows never do.

use crate::model::WarRoom;

use super::workbook::{SheetRow, Worksheet, parse_number};

const MINUTES_PER_DAY: f64 = 1440.0;

pub mod cols {
	pub const DATE: usize = 0;
	pub const INCIDENT_ID: usize = 1;
	pub const APPLICATION: usize = 2;
	pub const START_TIME: usize = 3;
	pub const END_TIME: usize = 4;
	pub const DURATION_MINUTES: usize = 5;
	pub const PARTICIPANTS: usize = 6;
	pub const STATUS: usize = 7;
	pub const NOTES: usize = 8;
	pub const RCA_STATUS: usize = 9;
	pub const RCA_LINK: usize = 10;
}

pub fn is_data_row(row: &SheetRow) -> bool {
	row.number(cols::DATE).is_some()
}

/// Time of day as a fraction of a day: either an Excel serial (`0.5`) or
/// `HH:MM[:SS]` text.
pub fn parse_time_fraction(raw: &str) -> Option<f64> {
	if let Some(v) = parse_number(raw) {
		return Some(v.fract().abs());
	}
	let mut parts = raw.trim().split(':');
	let h: u32 = parts.next()?.trim().parse().ok()?;
	let m: u32 = parts.next()?.trim().parse().ok()?;
	let s: u32 = match parts.next() {
		Some(p) => p.trim().parse().ok()?,
		None => 0,
	};
	if parts.next().is_some() || h > 23 || m > 59 || s > 59 {
		return None;
	}
	Some(f64::from(h * 3600 + m * 60 + s) / 86_400.0)
}

/// Session length in whole minutes, wrapping sessions that cross midnight.
pub fn duration_between(start: f64, end: f64) -> f64 {
	let mut minutes = (end - start) * MINUTES_PER_DAY;
	if minutes < 0.0 {
		minutes += MINUTES_PER_DAY;
	}
	minutes.round()
}

pub fn map_war_room(sheet: &Worksheet, row: &SheetRow) -> WarRoom {
	let start_time = parse_time_fraction(row.cell(cols::START_TIME));
	let end_time = parse_time_fraction(row.cell(cols::END_TIME));
	let duration_minutes = row
		.number(cols::DURATION_MINUTES)
		.or_else(|| Some(duration_between(start_time?, end_time?)));

	let rca_link = sheet
		.hyperlink(row.index, cols::RCA_LINK)
		.or(Some(row.cell(cols::RCA_LINK)))
		.map(str::trim)
		.filter(|l| !l.is_empty())
		.map(str::to_string);

	WarRoom {
		incident_id: row.cell(cols::INCIDENT_ID).to_string(),
		application: row.cell(cols::APPLICATION).to_string(),
		date: row.number(cols::DATE).map(f64::trunc),
		start_time,
		end_time,
		duration_minutes,
		participants: row
			.number(cols::PARTICIPANTS)
			.map(|p| p.round() as i32),
		status: row.cell(cols::STATUS).to_string(),
		notes: row.cell(cols::NOTES).to_string(),
		rca_status: row.cell(cols::RCA_STATUS).to_string(),
		rca_link,
		source_row: row.index,
	}
}

/// Map every data row; rows missing an id or application are kept so the
/// import can reject the file as a whole.
pub fn parse_war_rooms(sheet: &Worksheet) -> Vec<WarRoom> {
	sheet
		.rows
		.iter()
		.filter(|row| is_data_row(row))
		.map(|row| map_war_room(sheet, row))
		.collect()
}
