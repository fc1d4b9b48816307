use std::collections::BTreeSet;

use serde::Serialize;

use crate::dedup::{DuplicateAnalyzer, PhoneNormalizer};
use crate::mapper::CanonicalField;

/// Cell values treated as missing data.
const NULL_MARKERS: [&str; 3] = ["none", "null", "nan"];

/// Trims a raw cell value and maps null markers to the empty string.
pub fn normalize_cell(value: &str) -> String {
    let trimmed = value.trim();
    if NULL_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// One lead, keyed by canonical field. Read-only once ingested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// 1-based row number in the source file.
    pub row_number: usize,
    pub address: String,
    pub house_number: String,
    pub complement: String,
    pub owner_name: String,
    pub phone: String,
    pub email: String,
}

impl Record {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            ..Default::default()
        }
    }

    /// Builder-style setter; the value is normalized like a source cell.
    pub fn with(mut self, field: CanonicalField, value: &str) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: CanonicalField, value: &str) {
        let value = normalize_cell(value);
        match field {
            CanonicalField::Address => self.address = value,
            CanonicalField::HouseNumber => self.house_number = value,
            CanonicalField::Complement => self.complement = value,
            CanonicalField::OwnerName => self.owner_name = value,
            CanonicalField::Phone => self.phone = value,
            CanonicalField::Email => self.email = value,
        }
    }

    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Address => &self.address,
            CanonicalField::HouseNumber => &self.house_number,
            CanonicalField::Complement => &self.complement,
            CanonicalField::OwnerName => &self.owner_name,
            CanonicalField::Phone => &self.phone,
            CanonicalField::Email => &self.email,
        }
    }

    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_empty())
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Address and house number joined the way the target's single address
    /// input expects them.
    pub fn composed_address(&self) -> String {
        if self.house_number.is_empty() {
            self.address.clone()
        } else {
            format!("{}, {}", self.address, self.house_number)
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        format!("{} ({})", self.owner_name, self.composed_address())
    }
}

/// All valid records of one uploaded file plus the phones seen more than once.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub records: Vec<Record>,
    pub duplicate_phones: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip)]
    normalizer: PhoneNormalizer,
}

impl Batch {
    /// Builds a batch and runs the duplicate analysis over it.
    pub fn new(records: Vec<Record>, normalizer: PhoneNormalizer) -> Self {
        let duplicate_phones = DuplicateAnalyzer::new(normalizer.clone()).analyze(&records);
        Self {
            records,
            duplicate_phones,
            source_name: None,
            normalizer,
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn normalizer(&self) -> &PhoneNormalizer {
        &self.normalizer
    }

    /// Whether the record's phone is shared with another record of this batch.
    pub fn has_duplicate_phone(&self, record: &Record) -> bool {
        let normalized = self.normalizer.normalize(&record.phone);
        !normalized.is_empty() && self.duplicate_phones.contains(&normalized)
    }
}
