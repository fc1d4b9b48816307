use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use super::field::{fold_text, CanonicalField};

/// Shortest folded header that may be matched as an abbreviation of a synonym.
const MIN_ABBREVIATION_LEN: usize = 3;

/// Canonical field -> source column position, built once per file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    columns: BTreeMap<CanonicalField, usize>,
    headers: Vec<String>,
}

impl FieldMapping {
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    /// Original header label of the column a field was mapped to.
    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.column(field)
            .and_then(|idx| self.headers.get(idx))
            .map(String::as_str)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.columns.iter().map(|(field, idx)| (*field, *idx))
    }

    /// Canonical fields that no header satisfied.
    pub fn missing(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| !self.columns.contains_key(f))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Maps loosely named spreadsheet headers onto the canonical schema.
pub struct SchemaMapper;

impl SchemaMapper {
    /// Builds the mapping for one header row. Never fails: unmapped fields are
    /// simply absent.
    pub fn map<S: AsRef<str>>(headers: &[S]) -> FieldMapping {
        let folded: Vec<String> = headers.iter().map(|h| fold_text(h.as_ref())).collect();
        let mut claimed = vec![false; folded.len()];
        let mut columns = BTreeMap::new();

        for field in CanonicalField::ALL {
            let hit = folded.iter().enumerate().find(|(idx, header)| {
                !claimed[*idx] && Self::header_matches(header, field.synonyms())
            });

            if let Some((idx, _)) = hit {
                debug!(
                    "Mapped column {} ('{}') to {}",
                    idx,
                    headers[idx].as_ref(),
                    field
                );
                claimed[idx] = true;
                columns.insert(field, idx);
            }
        }

        FieldMapping {
            columns,
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
        }
    }

    fn header_matches(header: &str, synonyms: &[&str]) -> bool {
        if header.is_empty() {
            return false;
        }
        synonyms.iter().any(|synonym| {
            header.contains(synonym)
                || (header.chars().count() >= MIN_ABBREVIATION_LEN && synonym.contains(header))
        })
    }
}
