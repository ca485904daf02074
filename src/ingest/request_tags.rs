use crate::model::RequestTag;

use super::workbook::Worksheet;

pub mod cols {
	pub const LINKED_REQUEST_ID: usize = 0;
	pub const INFORMACION_ADICIONAL: usize = 1;
	pub const CATEGORIZACION: usize = 2;
}

/// Map the request-relationship sheet. Data rows start with a numeric linked
/// request id.
pub fn parse_request_tags(sheet: &Worksheet) -> Vec<RequestTag> {
	sheet
		.rows
		.iter()
		.filter(|row| row.number(cols::LINKED_REQUEST_ID).is_some())
		.map(|row| RequestTag {
			linked_request_id: row.cell(cols::LINKED_REQUEST_ID).to_string(),
			informacion_adicional: row.cell(cols::INFORMACION_ADICIONAL).to_string(),
			categorizacion: row.cell(cols::CATEGORIZACION).to_string(),
			source_row: row.index,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ingest::SheetRow;

	#[test]
	fn maps_numeric_rows_only() {
		let sheet = Worksheet::new(
			"Relaciones",
			vec![
				SheetRow {
					index: 0,
					cells: vec!["Solicitud".into(), "Información".into(), "Tag".into()],
				},
				SheetRow {
					index: 1,
					cells: vec!["54000".into(), "Cliente VIP".into(), "Urgente".into()],
				},
				SheetRow {
					index: 2,
					cells: vec!["54001".into()],
				},
			],
		);
		let tags = parse_request_tags(&sheet);
		assert_eq!(tags.len(), 2);
		assert_eq!(tags[0].linked_request_id, "54000");
		assert_eq!(tags[0].informacion_adicional, "Cliente VIP");
		assert_eq!(tags[0].categorizacion, "Urgente");
		assert_eq!(tags[1].categorizacion, "");
		assert_eq!(tags[1].source_row, 2);
	}
}
