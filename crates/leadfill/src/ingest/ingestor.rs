use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;
use tracing::info_span;

use crate::dedup::PhoneNormalizer;
use crate::error::IngestError;
use crate::mapper::{CanonicalField, FieldMapping, SchemaMapper};
use crate::sanitize;

use super::record::{Batch, Record};
use super::source::{open_source, RawRow, SourceReader};

/// Result of ingesting one uploaded file.
///
/// A file that could not be read at all produces an empty batch with the
/// reason in `diagnostic`; an empty batch without a diagnostic simply means no
/// row passed validation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub batch: Batch,
    pub mapping: FieldMapping,
    /// Data rows seen after the header row, blank ones included.
    pub rows_read: usize,
    pub rows_empty: usize,
    /// Rows dropped for missing a required field.
    pub rows_invalid: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl IngestReport {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: Some(diagnostic.into()),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.diagnostic.is_some()
    }
}

/// Reads a source file into a validated, ordered [`Batch`].
pub struct Ingestor {
    normalizer: PhoneNormalizer,
}

impl Ingestor {
    pub fn new(normalizer: PhoneNormalizer) -> Self {
        Self { normalizer }
    }

    /// Ingests a file, folding any read failure into the report's diagnostic.
    pub fn ingest_path(&self, path: &Path) -> IngestReport {
        match self.try_ingest_path(path) {
            Ok(report) => report,
            Err(e) => {
                warn!("Ingestion of {} failed: {}", sanitize::redact_path(path), e);
                IngestReport::failed(e.to_string())
            }
        }
    }

    pub fn try_ingest_path(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let file_name = sanitize::redact_path(path);
        let _span = info_span!("ingest", file = %file_name).entered();

        let source = open_source(path)?;
        let mut report = self.ingest_source(source)?;
        report.batch = std::mem::take(&mut report.batch).with_source_name(file_name);
        Ok(report)
    }

    pub fn ingest_source(&self, source: Box<dyn SourceReader>) -> Result<IngestReport, IngestError> {
        let mapping = SchemaMapper::map(source.headers());
        let missing = mapping.missing();
        if missing.iter().any(|f| CanonicalField::REQUIRED.contains(f)) {
            warn!(
                "No column found for required field(s): {}",
                missing
                    .iter()
                    .filter(|f| CanonicalField::REQUIRED.contains(f))
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let mut records = Vec::new();
        let mut rows_read = 0;
        let mut rows_empty = 0;
        let mut rows_invalid = 0;

        for row in source.into_rows() {
            let row = row?;
            rows_read += 1;

            if row.is_blank() {
                rows_empty += 1;
                continue;
            }

            let record = build_record(&row, &mapping);
            if record.is_valid() {
                records.push(record);
            } else {
                debug!(
                    "Row {} skipped, missing: {:?}",
                    row.row_number,
                    record.missing_required()
                );
                rows_invalid += 1;
            }
        }

        let batch = Batch::new(records, self.normalizer.clone());
        info!(
            "Ingested {} valid records ({} rows read, {} empty, {} invalid, {} duplicate phones)",
            batch.len(),
            rows_read,
            rows_empty,
            rows_invalid,
            batch.duplicate_phones.len()
        );

        Ok(IngestReport {
            batch,
            mapping,
            rows_read,
            rows_empty,
            rows_invalid,
            diagnostic: None,
        })
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(PhoneNormalizer::default())
    }
}

/// Builds a record from the mapped columns of one row.
pub fn build_record(row: &RawRow, mapping: &FieldMapping) -> Record {
    let mut record = Record::new(row.row_number);
    for (field, column) in mapping.iter() {
        record.set(field, row.cell(column));
    }
    record
}
