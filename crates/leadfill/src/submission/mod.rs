//! Field Submission Engine: fills one record into the target form and
//! classifies what the form answered.

pub mod config;
pub mod context;
pub mod engine;
pub mod outcome;
pub mod profile;

pub use config::EngineConfig;
pub use context::SubmissionContext;
pub use engine::SubmissionEngine;
pub use outcome::{AddressEntry, Confirmation, StepError, SubmissionOutcome, SubmissionReport};
pub use profile::FormProfile;
