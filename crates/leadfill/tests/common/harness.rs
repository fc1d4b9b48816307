//! Temporary fixture files for ingestion and config tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Isolated directory holding the files a test writes.
pub struct TestHarness {
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, bytes).expect("Failed to write fixture");
        path
    }

    pub fn write_csv(&self, name: &str, content: &str) -> PathBuf {
        self.write_bytes(name, content.as_bytes())
    }

    pub fn write_config(&self, json: &str) -> PathBuf {
        self.write_bytes("config.json", json.as_bytes())
    }

    /// Writes a single-sheet workbook using inline string cells. Empty values
    /// leave the cell out, like spreadsheet apps do.
    pub fn write_xlsx(&self, name: &str, rows: &[&[&str]]) -> PathBuf {
        let rows: Vec<Vec<Cell<'_>>> = rows
            .iter()
            .map(|row| row.iter().map(|value| Cell::Text(*value)).collect())
            .collect();
        let rows: Vec<&[Cell<'_>]> = rows.iter().map(Vec::as_slice).collect();
        self.write_xlsx_cells(name, &rows)
    }

    /// Writes a single-sheet workbook with explicit cell types.
    pub fn write_xlsx_cells(&self, name: &str, rows: &[&[Cell<'_>]]) -> PathBuf {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                match cell {
                    Cell::Text("") => {}
                    Cell::Text(value) => {
                        let escaped = value.replace('&', "&amp;").replace('<', "&lt;");
                        sheet.push_str(&format!(
                            r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                            reference, escaped
                        ));
                    }
                    Cell::Number(value) => {
                        sheet.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value));
                    }
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        let content_types = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;
        let workbook = r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Planilha1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();
            for (entry, content) in [
                ("[Content_Types].xml", content_types.to_string()),
                ("xl/workbook.xml", workbook.to_string()),
                ("xl/_rels/workbook.xml.rels", rels.to_string()),
                ("xl/worksheets/sheet1.xml", sheet),
            ] {
                zip.start_file(entry, options).expect("Failed to start zip entry");
                zip.write_all(content.as_bytes())
                    .expect("Failed to write zip entry");
            }
            zip.finish().expect("Failed to finish workbook");
        }
        self.write_bytes(name, &buffer.into_inner())
    }
}

/// Typed workbook cell for fixtures.
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(&'a str),
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
