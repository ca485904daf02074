/// Workbook container formats accepted by the upload endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
	/// Office Open XML (a ZIP package)
	Xlsx,
	/// Legacy BIFF inside a compound file
	Xls,
}

impl WorkbookFormat {
	pub fn as_str(&self) -> &'static str {
		match self {
			WorkbookFormat::Xlsx => "xlsx",
			WorkbookFormat::Xls => "xls",
		}
	}

	/// Map an upload filename to a format by its extension (case-insensitive).
	pub fn from_filename(name: &str) -> Option<Self> {
		let (_, ext) = name.rsplit_once('.')?;
		match ext.to_ascii_lowercase().as_str() {
			"xlsx" => Some(WorkbookFormat::Xlsx),
			"xls" => Some(WorkbookFormat::Xls),
			_ => None,
		}
	}
}

const CFB_MAGIC: [u8; 8] = [0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];

/// Detect the workbook container from its leading bytes.
pub fn detect_workbook_format(peek: &[u8]) -> Option<WorkbookFormat> {
	if peek.len() >= 4 && peek[0] == 0x50 && peek[1] == 0x4b && peek[2] == 0x03 && peek[3] == 0x04
	{
		return Some(WorkbookFormat::Xlsx);
	}

	if peek.len() >= CFB_MAGIC.len() && peek[..CFB_MAGIC.len()] == CFB_MAGIC {
		return Some(WorkbookFormat::Xls);
	}

	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detect_zip_package() {
		let peek = [0x50_u8, 0x4b, 0x03, 0x04, 0x14, 0x00];
		assert_eq!(detect_workbook_format(&peek), Some(WorkbookFormat::Xlsx));
	}

	#[test]
	fn detect_compound_file() {
		let mut peek = CFB_MAGIC.to_vec();
		peek.extend_from_slice(&[0, 0, 0, 0]);
		assert_eq!(detect_workbook_format(&peek), Some(WorkbookFormat::Xls));
	}

	#[test]
	fn reject_text_and_short_input() {
		assert_eq!(detect_workbook_format(b"col1,col2\n1,2\n"), None);
		assert_eq!(detect_workbook_format(&[0x50]), None);
		assert_eq!(detect_workbook_format(&[]), None);
	}

	#[test]
	fn extension_lookup() {
		assert_eq!(
			WorkbookFormat::from_filename("Report.XLSX"),
			Some(WorkbookFormat::Xlsx)
		);
		assert_eq!(
			WorkbookFormat::from_filename("legacy.xls"),
			Some(WorkbookFormat::Xls)
		);
		assert_eq!(WorkbookFormat::from_filename("export.csv"), None);
		assert_eq!(WorkbookFormat::from_filename("notes.txt"), None);
		assert_eq!(WorkbookFormat::from_filename("xlsx"), None);
	}
}
