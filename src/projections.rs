//! Read-side shapes served by the categorization and war-room endpoints.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::ingest::workbook::date_to_excel_serial;
use crate::model::{Categorization, JoinedCategorization, NOT_ASSIGNED, WarRoom, WarRoomFilter};

/// A categorization with the tag values of its linked request folded in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationWithInfo {
	#[serde(flatten)]
	pub categorization: Categorization,
	pub additional_information: Vec<String>,
	pub tag_categorizacion: Vec<String>,
}

fn meaningful(value: Option<&str>) -> Option<&str> {
	value
		.map(str::trim)
		.filter(|v| !v.is_empty() && *v != NOT_ASSIGNED)
}

fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
	if let Some(v) = meaningful(value) {
		if !values.iter().any(|existing| existing == v) {
			values.push(v.to_string());
		}
	}
}

/// Fold join-multiplied rows back to one entity per request id, keeping the
/// order in which request ids first appear.
pub fn with_additional_info(rows: Vec<JoinedCategorization>) -> Vec<CategorizationWithInfo> {
	let mut out: Vec<CategorizationWithInfo> = Vec::new();
	let mut index: HashMap<String, usize> = HashMap::new();

	for row in rows {
		let i = match index.get(&row.categorization.request_id) {
			Some(&i) => i,
			None => {
				index.insert(row.categorization.request_id.clone(), out.len());
				out.push(CategorizationWithInfo {
					categorization: row.categorization,
					additional_information: Vec::new(),
					tag_categorizacion: Vec::new(),
				});
				out.len() - 1
			}
		};
		let entry = &mut out[i];
		push_unique(
			&mut entry.additional_information,
			row.informacion_adicional.as_deref(),
		);
		push_unique(&mut entry.tag_categorizacion, row.categorizacion.as_deref());
	}

	out
}

/// Serial-day range covering the calendar month `YYYY-MM`.
pub fn month_filter(month: &str) -> Option<WarRoomFilter> {
	let (y, m) = month.trim().split_once('-')?;
	let year: i32 = y.parse().ok()?;
	let month: u32 = m.parse().ok()?;
	let first = NaiveDate::from_ymd_opt(year, month, 1)?;
	let next = if first.month() == 12 {
		NaiveDate::from_ymd_opt(year + 1, 1, 1)?
	} else {
		NaiveDate::from_ymd_opt(year, month + 1, 1)?
	};
	Some(WarRoomFilter {
		date_from: date_to_excel_serial(first),
		date_to: date_to_excel_serial(next),
	})
}

/// Aggregates over a filtered set of war rooms.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarRoomAnalytics {
	pub total: usize,
	pub total_duration_minutes: f64,
	pub average_duration_minutes: Option<f64>,
	pub total_participants: i64,
	pub by_status: Vec<Bucket>,
	pub by_application: Vec<Bucket>,
	pub items: Vec<WarRoom>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
	pub label: String,
	pub count: usize,
}

fn buckets<'a>(values: impl Iterator<Item = &'a str>) -> Vec<Bucket> {
	let mut counts: Vec<Bucket> = Vec::new();
	for v in values {
		let label = if v.trim().is_empty() { "(blank)" } else { v.trim() };
		match counts.iter_mut().find(|b| b.label == label) {
			Some(b) => b.count += 1,
			None => counts.push(Bucket {
				label: label.to_string(),
				count: 1,
			}),
		}
	}
	counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
	counts
}

pub fn war_room_analytics(items: Vec<WarRoom>) -> WarRoomAnalytics {
	let durations: Vec<f64> = items.iter().filter_map(|r| r.duration_minutes).collect();
	let total_duration_minutes: f64 = durations.iter().sum();
	let average_duration_minutes = if durations.is_empty() {
		None
	} else {
		Some((total_duration_minutes / durations.len() as f64 * 10.0).round() / 10.0)
	};

	WarRoomAnalytics {
		total: items.len(),
		total_duration_minutes,
		average_duration_minutes,
		total_participants: items
			.iter()
			.filter_map(|r| r.participants)
			.map(i64::from)
			.sum(),
		by_status: buckets(items.iter().map(|r| r.status.as_str())),
		by_application: buckets(items.iter().map(|r| r.application.as_str())),
		items,
	}
}
