//! Cell hyperlink extraction.
//!
//! calamine exposes cell values and formulas but not the `<hyperlinks>` part of
//! a worksheet, so external link targets are resolved straight from the
//! `.xlsx` package: `xl/workbook.xml` names the sheet's relationship id,
//! `xl/_rels/workbook.xml.rels` maps it to the worksheet part, and the
//! worksheet's own `.rels` part holds the link targets.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek};

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use zip::ZipArchive;
use zip::result::ZipError;

use super::ParseError;

/// `(row, col)` of a cell, both 0-based and absolute within the sheet.
pub type CellPos = (usize, usize);

const ENTITIES: [(&str, &str); 6] = [
	("&amp;", "&"),
	("&lt;", "<"),
	("&gt;", ">"),
	("&quot;", "\""),
	("&#39;", "'"),
	("&nbsp;", " "),
];

// A range hyperlink larger than this is almost certainly a whole-column link
const MAX_LINKED_CELLS: usize = 100_000;

static HYPERLINK_FORMULA: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r#"(?i)^\s*=?\s*HYPERLINK\(\s*"((?:[^"]|"")*)""#).expect("static regex")
});

/// Decode the HTML entities spreadsheet exports leave inside link targets.
/// Single pass, so `&amp;lt;` becomes `&lt;` and not `<`.
pub fn decode_html_entities(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	let mut rest = input;
	while let Some(pos) = rest.find('&') {
		out.push_str(&rest[..pos]);
		let tail = &rest[pos..];
		match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
			Some((entity, replacement)) => {
				out.push_str(replacement);
				rest = &tail[entity.len()..];
			}
			None => {
				out.push('&');
				rest = &tail[1..];
			}
		}
	}
	out.push_str(rest);
	out
}

/// Extract the literal URL of a `HYPERLINK("url", ...)` formula.
pub fn hyperlink_formula_target(formula: &str) -> Option<String> {
	let caps = HYPERLINK_FORMULA.captures(formula)?;
	let raw = caps.get(1)?.as_str().replace("\"\"", "\"");
	let target = decode_html_entities(&raw).trim().to_string();
	if target.is_empty() { None } else { Some(target) }
}

fn xml_err<E: std::fmt::Display>(e: E) -> ParseError {
	ParseError::Hyperlinks(e.to_string())
}

fn read_part<R: Read + Seek>(
	archive: &mut ZipArchive<R>,
	path: &str,
) -> Result<Option<String>, ParseError> {
	match archive.by_name(path) {
		Ok(mut file) => {
			let mut s = String::new();
			file.read_to_string(&mut s).map_err(xml_err)?;
			Ok(Some(s))
		}
		Err(ZipError::FileNotFound) => Ok(None),
		Err(e) => Err(xml_err(e)),
	}
}

/// Collect `(local name of attr, unescaped value)` for elements named `element`.
fn collect_elements(
	xml: &str,
	element: &[u8],
) -> Result<Vec<BTreeMap<String, String>>, ParseError> {
	let mut reader = Reader::from_str(xml);
	reader.config_mut().trim_text(true);

	let mut buf = Vec::new();
	let mut out = Vec::new();

	loop {
		match reader.read_event_into(&mut buf).map_err(xml_err)? {
			Event::Eof => break,
			Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == element => {
				let mut attrs = BTreeMap::new();
				for attr in e.attributes() {
					let attr = attr.map_err(xml_err)?;
					let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
					let value = attr.unescape_value().map_err(xml_err)?.into_owned();
					attrs.insert(key, value);
				}
				out.push(attrs);
			}
			_ => {}
		}
		buf.clear();
	}

	Ok(out)
}

/// Relationship id → target.
fn parse_relationships(rels_xml: &str) -> Result<HashMap<String, String>, ParseError> {
	Ok(collect_elements(rels_xml, b"Relationship")?
		.into_iter()
		.filter_map(|mut attrs| Some((attrs.remove("Id")?, attrs.remove("Target")?)))
		.collect())
}

fn resolve_part_path(target: &str) -> String {
	match target.strip_prefix('/') {
		Some(absolute) => absolute.to_string(),
		None => format!("xl/{}", target),
	}
}

fn rels_path_for(part: &str) -> String {
	match part.rsplit_once('/') {
		Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
		None => format!("_rels/{}.rels", part),
	}
}

/// Parse an A1 reference such as `C7` into a 0-based `(row, col)`.
pub fn parse_a1(reference: &str) -> Option<CellPos> {
	let reference = reference.trim().replace('$', "");
	let split = reference.find(|c: char| c.is_ascii_digit())?;
	let (letters, digits) = reference.split_at(split);
	if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
		return None;
	}
	let col = letters
		.to_ascii_uppercase()
		.bytes()
		.try_fold(0usize, |acc, b| {
			acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
		})?;
	let row: usize = digits.parse().ok()?;
	if row == 0 {
		return None;
	}
	Some((row - 1, col - 1))
}

fn expand_range(reference: &str) -> Vec<CellPos> {
	let (start, end) = match reference.split_once(':') {
		Some((a, b)) => match (parse_a1(a), parse_a1(b)) {
			(Some(a), Some(b)) => (a, b),
			_ => return Vec::new(),
		},
		None => match parse_a1(reference) {
			Some(c) => (c, c),
			None => return Vec::new(),
		},
	};

	let rows = start.0.min(end.0)..=start.0.max(end.0);
	let cols = start.1.min(end.1)..=start.1.max(end.1);
	let count = rows.clone().count().saturating_mul(cols.clone().count());
	if count > MAX_LINKED_CELLS {
		log::warn!("ignoring hyperlink over {} cells ({})", count, reference);
		return Vec::new();
	}

	rows.flat_map(|r| cols.clone().map(move |c| (r, c)))
		.collect()
}

/// Read the external hyperlinks of worksheet `sheet_name` from an `.xlsx`
/// package. Internal (`location=`) links are ignored.
pub fn read_package_hyperlinks(
	bytes: &[u8],
	sheet_name: &str,
) -> Result<HashMap<CellPos, String>, ParseError> {
	let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(xml_err)?;

	let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?
		.ok_or_else(|| ParseError::Hyperlinks("package has no xl/workbook.xml".into()))?;
	let sheet_rid = collect_elements(&workbook_xml, b"sheet")?
		.into_iter()
		.find(|attrs| attrs.get("name").map(String::as_str) == Some(sheet_name))
		.and_then(|mut attrs| attrs.remove("id"))
		.ok_or_else(|| ParseError::SheetNotFound(sheet_name.to_string()))?;

	let workbook_rels = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?
		.map(|x| parse_relationships(&x))
		.transpose()?
		.unwrap_or_default();
	let Some(sheet_target) = workbook_rels.get(&sheet_rid) else {
		return Err(ParseError::Hyperlinks(format!(
			"workbook relationship {} is missing",
			sheet_rid
		)));
	};
	let sheet_part = resolve_part_path(sheet_target);

	let Some(sheet_xml) = read_part(&mut archive, &sheet_part)? else {
		return Err(ParseError::Hyperlinks(format!(
			"worksheet part {} is missing",
			sheet_part
		)));
	};
	let sheet_rels = read_part(&mut archive, &rels_path_for(&sheet_part))?
		.map(|x| parse_relationships(&x))
		.transpose()?
		.unwrap_or_default();

	let mut out = HashMap::new();
	for attrs in collect_elements(&sheet_xml, b"hyperlink")? {
		let (Some(reference), Some(rid)) = (attrs.get("ref"), attrs.get("id")) else {
			continue;
		};
		let Some(target) = sheet_rels.get(rid) else {
			log::debug!("hyperlink {} references missing relationship {}", reference, rid);
			continue;
		};
		let target = decode_html_entities(target).trim().to_string();
		if target.is_empty() {
			continue;
		}
		for pos in expand_range(reference) {
			out.insert(pos, target.clone());
		}
	}

	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_each_known_entity() {
		assert_eq!(
			decode_html_entities("https://sd.local/view?a=1&amp;b=2"),
			"https://sd.local/view?a=1&b=2"
		);
		assert_eq!(decode_html_entities("&lt;x&gt;"), "<x>");
		assert_eq!(decode_html_entities("&quot;q&quot; &#39;s&#39;"), "\"q\" 's'");
		assert_eq!(decode_html_entities("a&nbsp;b"), "a b");
	}

	#[test]
	fn decoding_is_single_pass_and_keeps_unknown_entities() {
		assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
		assert_eq!(decode_html_entities("R&D &copy; &"), "R&D &copy; &");
	}

	#[test]
	fn formula_target_is_extracted_and_decoded() {
		assert_eq!(
			hyperlink_formula_target(r#"HYPERLINK("https://sd.local/?id=7&amp;x=1","7")"#),
			Some("https://sd.local/?id=7&x=1".to_string())
		);
		assert_eq!(
			hyperlink_formula_target(r#"=hyperlink( "https://a/""q""" )"#),
			Some("https://a/\"q\"".to_string())
		);
		assert_eq!(hyperlink_formula_target("SUM(A1:A3)"), None);
		assert_eq!(hyperlink_formula_target(r#"HYPERLINK("")"#), None);
	}

	#[test]
	fn a1_references() {
		assert_eq!(parse_a1("A1"), Some((0, 0)));
		assert_eq!(parse_a1("C7"), Some((6, 2)));
		assert_eq!(parse_a1("$AA$10"), Some((9, 26)));
		assert_eq!(parse_a1("A0"), None);
		assert_eq!(parse_a1("7"), None);
		assert_eq!(parse_a1("A1B"), None);
	}

	#[test]
	fn ranges_expand_to_every_cell() {
		let cells = expand_range("B2:C3");
		assert_eq!(cells, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
		assert!(expand_range("A1:XFD1048576").is_empty());
	}

	#[test]
	fn part_paths() {
		assert_eq!(resolve_part_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
		assert_eq!(resolve_part_path("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
		assert_eq!(
			rels_path_for("xl/worksheets/sheet1.xml"),
			"xl/worksheets/_rels/sheet1.xml.rels"
		);
	}

	#[test]
	fn relationships_are_keyed_by_id() {
		let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://sd.local/?a=1&amp;amp;b=2" TargetMode="External"/>
</Relationships>"#;
		let rels = parse_relationships(xml).expect("parse");
		// the XML layer unescapes once; the HTML layer runs later
		assert_eq!(rels.get("rId1").map(String::as_str), Some("https://sd.local/?a=1&amp;b=2"));
	}
}
