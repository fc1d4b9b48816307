use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use log::debug;

use crate::error::IngestError;

use super::source::{is_blank_row, RawRow, RowIter, SourceReader};

/// Largest magnitude at which a whole float is still rendered as an integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// First worksheet of a workbook (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
///
/// The sheet is read up front; rows are then handed out in sheet order.
pub struct WorkbookSource {
    headers: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl WorkbookSource {
    /// Opens by extension; files without a known workbook extension are
    /// tried against every supported format.
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        match open_workbook_auto(path) {
            Ok(workbook) => Self::from_sheets(path, workbook),
            Err(calamine::Error::Msg(_)) => {
                let bytes = std::fs::read(path).map_err(|e| IngestError::ReadFile {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                Self::from_reader(path, Cursor::new(bytes))
            }
            Err(e) => Err(IngestError::malformed(
                path,
                format!("not a valid workbook: {}", e),
            )),
        }
    }

    pub fn from_reader<R>(path: &Path, reader: R) -> Result<Self, IngestError>
    where
        R: Read + Seek + Clone,
    {
        let workbook = open_workbook_auto_from_rs(reader)
            .map_err(|e| IngestError::malformed(path, format!("not a valid workbook: {}", e)))?;
        Self::from_sheets(path, workbook)
    }

    fn from_sheets<R: Read + Seek>(path: &Path, mut workbook: Sheets<R>) -> Result<Self, IngestError> {
        let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
            return Err(IngestError::malformed(path, "workbook has no worksheets"));
        };
        debug!("Reading worksheet '{}' from {}", sheet_name, path.display());

        let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
            IngestError::malformed(path, format!("cannot read worksheet '{}': {}", sheet_name, e))
        })?;

        let mut rows = sheet_rows(&range)
            .into_iter()
            .skip_while(|(_, cells)| is_blank_row(cells));
        let headers = rows.next().map(|(_, cells)| cells).unwrap_or_default();

        Ok(Self {
            headers,
            rows: rows.collect(),
        })
    }
}

impl SourceReader for WorkbookSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn into_rows(self: Box<Self>) -> RowIter {
        Box::new(
            self.rows
                .into_iter()
                .map(|(n, cells)| Ok(RawRow::new(n, cells))),
        )
    }
}

/// Rows of the used range with their 1-based sheet row numbers. The range
/// begins at the first non-empty cell, so its offset is added back.
fn sheet_rows(range: &Range<Data>) -> Vec<(usize, Vec<String>)> {
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    range
        .rows()
        .enumerate()
        .map(|(i, row)| (first_row + i + 1, row.iter().map(cell_text).collect()))
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

/// Whole numbers lose the trailing `.0` (phone and house numbers are often
/// stored as numeric cells).
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_FLOAT {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// Test helper: builds an in-memory `.xlsx` from rows of cell strings.
#[cfg(test)]
pub(crate) fn build_xlsx(rows: &[Vec<&str>]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut shared = Vec::new();
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = (b'A' + c as u8) as char;
            if value.chars().all(|ch| ch.is_ascii_digit() || ch == '.') {
                sheet.push_str(&format!(r#"<c r="{}{}"><v>{}</v></c>"#, col, r + 1, value));
                continue;
            }
            shared.push(value.to_string());
            sheet.push_str(&format!(
                r#"<c r="{}{}" t="s"><v>{}</v></c>"#,
                col,
                r + 1,
                shared.len() - 1
            ));
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut strings = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    for s in &shared {
        let escaped = s.replace('&', "&amp;").replace('<', "&lt;");
        strings.push_str(&format!("<si><t>{}</t></si>", escaped));
    }
    strings.push_str("</sst>");

    let content_types = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#;
    let workbook = r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Leads" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    let rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();
        for (name, content) in [
            ("[Content_Types].xml", content_types.to_string()),
            ("xl/workbook.xml", workbook.to_string()),
            ("xl/_rels/workbook.xml.rels", rels.to_string()),
            ("xl/sharedStrings.xml", strings),
            ("xl/worksheets/sheet1.xml", sheet),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(bytes: Vec<u8>) -> WorkbookSource {
        WorkbookSource::from_reader(Path::new("leads.xlsx"), Cursor::new(bytes)).unwrap()
    }

    fn rows_of(source: WorkbookSource) -> Vec<RawRow> {
        Box::new(source)
            .into_rows()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_reads_headers_and_rows() {
        let bytes = build_xlsx(&[
            vec!["Endereço", "Número", "Nome", "Celular"],
            vec!["Rua A", "10", "Jo & Ana", "+5511999990000"],
        ]);
        let source = open(bytes);
        assert_eq!(source.headers(), &["Endereço", "Número", "Nome", "Celular"]);

        let rows = rows_of(source);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].cell(1), "10");
        assert_eq!(rows[0].cell(2), "Jo & Ana");
    }

    #[test]
    fn test_sparse_cells_keep_their_columns() {
        let bytes = build_xlsx(&[vec!["A", "B", "C"], vec!["x", "", "z"]]);
        let rows = rows_of(open(bytes));
        assert_eq!(rows[0].cells, vec!["x", "", "z"]);
    }

    #[test]
    fn test_leading_blank_rows_keep_sheet_row_numbers() {
        let bytes = build_xlsx(&[
            vec!["", ""],
            vec!["Nome", "Telefone"],
            vec!["Jo", "5511999990000"],
        ]);
        let source = open(bytes);
        assert_eq!(source.headers(), &["Nome", "Telefone"]);
        let rows = rows_of(source);
        assert_eq!(rows[0].row_number, 3);
        assert_eq!(rows[0].cell(1), "5511999990000");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(5511999990000.0)), "5511999990000");
        assert_eq!(cell_text(&Data::Float(10.5)), "10.5");
        assert_eq!(cell_text(&Data::Int(42)), "42");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Rua A".to_string())), "Rua A");
    }

    #[test]
    fn test_not_a_workbook_is_malformed() {
        let result =
            WorkbookSource::from_reader(Path::new("x.xlsx"), Cursor::new(b"nope".to_vec()));
        assert!(matches!(result, Err(IngestError::MalformedSource { .. })));
    }

    #[test]
    fn test_open_sniffs_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, build_xlsx(&[vec!["Nome"], vec!["Jo"]])).unwrap();

        let source = WorkbookSource::open(&path).unwrap();
        assert_eq!(source.headers(), &["Nome"]);
    }
}
