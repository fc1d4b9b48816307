//! Batch-level duplicate phone detection.
//!
//! Advisory only: duplicates are reported in the job state and log, and can
//! feed an optional pre-check, but records are never removed from a batch.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ingest::Record;

/// Normalizes phone numbers so that formatting differences and a leading
/// country or trunk prefix do not hide duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNormalizer {
    /// Country calling code stripped from numbers longer than a national one.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Digits in a full national number (area code included).
    #[serde(default = "default_national_length")]
    pub national_length: usize,
}

fn default_country_code() -> String {
    "55".to_string()
}

fn default_national_length() -> usize {
    11
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            national_length: default_national_length(),
        }
    }
}

impl PhoneNormalizer {
    pub fn new(country_code: &str, national_length: usize) -> Self {
        Self {
            country_code: country_code.to_string(),
            national_length,
        }
    }

    /// Strips separators, trunk zeros and the country code.
    ///
    /// Idempotent: prefixes are removed until none applies.
    pub fn normalize(&self, raw: &str) -> String {
        let mut number: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();

        loop {
            let trimmed = number.trim_start_matches('0');
            if trimmed.len() != number.len() {
                number = trimmed.to_string();
                continue;
            }
            if !self.country_code.is_empty()
                && number.len() > self.national_length
                && number.starts_with(&self.country_code)
            {
                number = number[self.country_code.len()..].to_string();
                continue;
            }
            break;
        }

        number
    }
}

pub struct DuplicateAnalyzer {
    normalizer: PhoneNormalizer,
}

impl DuplicateAnalyzer {
    pub fn new(normalizer: PhoneNormalizer) -> Self {
        Self { normalizer }
    }

    /// Returns every normalized phone that occurs more than once.
    pub fn analyze(&self, records: &[Record]) -> BTreeSet<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();

        for record in records {
            if record.phone.is_empty() {
                continue;
            }
            let normalized = self.normalizer.normalize(&record.phone);
            if normalized.is_empty() {
                continue;
            }
            *counts.entry(normalized).or_insert(0) += 1;
        }

        let duplicates: BTreeSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(phone, _)| phone)
            .collect();

        debug!(
            "Duplicate analysis: {} records, {} shared phones",
            records.len(),
            duplicates.len()
        );
        duplicates
    }
}
