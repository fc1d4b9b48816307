pub mod delimited;
pub mod ingestor;
pub mod record;
pub mod source;
pub mod workbook;

pub use ingestor::{build_record, IngestReport, Ingestor};
pub use record::{normalize_cell, Batch, Record};
pub use source::{open_source, RawRow, RowIter, SourceFormat, SourceReader};
