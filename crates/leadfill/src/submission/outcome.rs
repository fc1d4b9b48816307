use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::SessionError;
use crate::mapper::CanonicalField;

/// Result of one record's submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum SubmissionOutcome {
    Success,
    SkippedDuplicatePhone,
    FieldNotFound(CanonicalField),
    SubmitFailed(String),
    SessionError(String),
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success)
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Success => write!(f, "submitted"),
            SubmissionOutcome::SkippedDuplicatePhone => {
                write!(f, "skipped, phone already registered")
            }
            SubmissionOutcome::FieldNotFound(field) => write!(f, "field not found: {}", field),
            SubmissionOutcome::SubmitFailed(reason) => write!(f, "submit failed: {}", reason),
            SubmissionOutcome::SessionError(reason) => write!(f, "session error: {}", reason),
        }
    }
}

/// How a success was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Confirmation {
    /// A success indicator was visible after submit.
    Explicit,
    /// Neither a success nor an error indicator was visible; counted as success.
    Implicit,
}

/// How the address ended up in the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressEntry {
    /// First visible suggestion was selected.
    Suggestion,
    /// Typed text confirmed with Enter.
    Confirmed,
    /// Left as typed.
    Typed,
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressEntry::Suggestion => write!(f, "picked from suggestions"),
            AddressEntry::Confirmed => write!(f, "confirmed with Enter"),
            AddressEntry::Typed => write!(f, "left as typed"),
        }
    }
}

/// Why a step stopped the record. Folded into a [`SubmissionOutcome`] by the
/// engine; never escapes it.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("phone already registered: {0}")]
    DuplicatePhone(String),

    #[error("required field '{0}' not found on the form")]
    FieldNotFound(CanonicalField),

    #[error("submit control not found")]
    SubmitControlMissing,

    #[error("target reported an error: {0}")]
    Rejected(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<StepError> for SubmissionOutcome {
    fn from(error: StepError) -> Self {
        match error {
            StepError::DuplicatePhone(_) => SubmissionOutcome::SkippedDuplicatePhone,
            StepError::FieldNotFound(field) => SubmissionOutcome::FieldNotFound(field),
            StepError::SubmitControlMissing => {
                SubmissionOutcome::SubmitFailed("submit control not found".to_string())
            }
            StepError::Rejected(message) => SubmissionOutcome::SubmitFailed(message),
            StepError::Session(e) => SubmissionOutcome::SessionError(e.to_string()),
        }
    }
}

/// Everything the controller needs to count and narrate one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub outcome: SubmissionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_entry: Option<AddressEntry>,
    /// Optional form inputs that could not be found and were left out.
    pub skipped_fields: Vec<CanonicalField>,
    pub notes: Vec<String>,
}

impl SubmissionReport {
    /// One-line summary for the job log.
    pub fn summary(&self) -> String {
        let mut line = self.outcome.to_string();
        if self.confirmation == Some(Confirmation::Implicit) {
            line.push_str(" (no confirmation shown)");
        }
        if let Some(entry) = self.address_entry {
            line.push_str(&format!("; address {}", entry));
        }
        if !self.skipped_fields.is_empty() {
            let skipped: Vec<&str> = self.skipped_fields.iter().map(|f| f.as_str()).collect();
            line.push_str(&format!("; skipped: {}", skipped.join(", ")));
        }
        line
    }
}
