use std::io::Read;
use std::path::Path;

use crate::error::IngestError;

use super::delimited::DelimitedSource;
use super::workbook::WorkbookSource;

/// Local file header magic shared by every ZIP container (xlsx, ods).
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
/// Compound document signature of legacy `.xls` workbooks.
const OLE2_MAGIC: [u8; 4] = [0xd0, 0xcf, 0x11, 0xe0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" | "txt" => Some(Self::Delimited),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Workbook),
            _ => None,
        }
    }

    /// Picks the reader for a path, sniffing the content when the extension
    /// is unknown.
    pub fn detect(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        if let Some(format) = Self::from_extension(ext) {
            return Ok(format);
        }

        let mut magic = [0u8; 4];
        let mut file = std::fs::File::open(path).map_err(|e| IngestError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let read = file.read(&mut magic).map_err(|e| IngestError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        if read == magic.len() && (magic == ZIP_MAGIC || magic == OLE2_MAGIC) {
            Ok(Self::Workbook)
        } else {
            Ok(Self::Delimited)
        }
    }
}

/// One data row as read from the source, before mapping.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 1-based row number in the source file.
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(row_number: usize, cells: Vec<String>) -> Self {
        Self { row_number, cells }
    }

    /// Cell at a column position; out-of-range columns read as empty.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        is_blank_row(&self.cells)
    }
}

pub(crate) fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Row iterator handed out by a reader. Consumed once; reopen to restart.
pub type RowIter = Box<dyn Iterator<Item = Result<RawRow, IngestError>> + Send>;

/// A spreadsheet opened for reading: header row first, then data rows.
pub trait SourceReader: Send {
    fn headers(&self) -> &[String];

    fn into_rows(self: Box<Self>) -> RowIter;
}

/// Opens a source file with the reader matching its format.
pub fn open_source(path: &Path) -> Result<Box<dyn SourceReader>, IngestError> {
    match SourceFormat::detect(path)? {
        SourceFormat::Delimited => Ok(Box::new(DelimitedSource::open(path)?)),
        SourceFormat::Workbook => Ok(Box::new(WorkbookSource::open(path)?)),
    }
}
