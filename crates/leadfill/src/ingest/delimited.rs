use std::io::Cursor;
use std::path::{Path, PathBuf};
use csv::{ByteRecord, ReaderBuilder};
use encoding_rs::WINDOWS_1252;
use log::debug;

use crate::error::IngestError;

use super::source::{is_blank_row, RawRow, RowIter, SourceReader};

const UTF8_BOM: char = '\u{feff}';

/// CSV export of a spreadsheet. The delimiter (`,` or `;`) is sniffed from
/// the first line.
pub struct DelimitedSource {
    path: PathBuf,
    headers: Vec<String>,
    records: csv::ByteRecordsIntoIter<Cursor<Vec<u8>>>,
}

impl DelimitedSource {
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(path, bytes)
    }

    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self, IngestError> {
        let bytes = decode_text(path, bytes);
        let delimiter = sniff_delimiter(&bytes);
        debug!(
            "Reading {} as delimited text (delimiter '{}')",
            path.display(),
            delimiter as char
        );

        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(Cursor::new(bytes))
            .into_byte_records();

        // The first non-blank line is the header row.
        let mut headers = Vec::new();
        for record in records.by_ref() {
            let record = record.map_err(|e| IngestError::malformed(path, e.to_string()))?;
            let cells = decode_record(&record);
            if !is_blank_row(&cells) {
                headers = cells;
                break;
            }
        }
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches(UTF8_BOM).to_string();
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            records,
        })
    }
}

impl SourceReader for DelimitedSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn into_rows(self: Box<Self>) -> RowIter {
        let DelimitedSource { path, records, .. } = *self;

        Box::new(records.map(move |record| {
            let record = record.map_err(|e| IngestError::malformed(&path, e.to_string()))?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or_default();
            Ok(RawRow::new(row_number, decode_record(&record)))
        }))
    }
}

fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn decode_record(record: &ByteRecord) -> Vec<String> {
    record.iter().map(decode_cell).collect()
}

/// Cells are UTF-8 once the whole buffer went through [`decode_text`].
fn decode_cell(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// UTF-8 when the whole file is valid UTF-8, otherwise Windows-1252 (the
/// usual encoding of spreadsheet CSV exports on Portuguese-locale machines).
fn decode_text(path: &Path, bytes: Vec<u8>) -> Vec<u8> {
    match String::from_utf8(bytes) {
        Ok(text) => text.into_bytes(),
        Err(e) => {
            debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (text, _, _) = WINDOWS_1252.decode(e.as_bytes());
            text.into_owned().into_bytes()
        }
    }
}
