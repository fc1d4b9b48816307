use crate::ingest::Record;
use crate::mapper::CanonicalField;

use super::outcome::{AddressEntry, Confirmation};

pub struct SubmissionContext<'a> {
    // Input
    pub record: &'a Record,
    /// Phone as typed into the form (normalized).
    pub phone: String,
    /// The batch saw this phone more than once.
    pub repeated_in_batch: bool,

    // Step results
    pub address_entry: Option<AddressEntry>,
    pub confirmation: Option<Confirmation>,

    // Non-fatal findings
    pub skipped_fields: Vec<CanonicalField>,
    pub notes: Vec<String>,
}

impl<'a> SubmissionContext<'a> {
    pub fn new(record: &'a Record, phone: String, repeated_in_batch: bool) -> Self {
        Self {
            record,
            phone,
            repeated_in_batch,
            address_entry: None,
            confirmation: None,
            skipped_fields: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn skip(&mut self, field: CanonicalField) {
        if !self.skipped_fields.contains(&field) {
            self.skipped_fields.push(field);
        }
    }
}
