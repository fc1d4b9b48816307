pub mod automation;
pub mod broadcast;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod job;
pub mod mapper;
pub mod sanitize;
pub mod submission;

pub use automation::{AutomationSession, SessionFactory, SimulatedTarget, WebDriverFactory};
pub use broadcast::{LogBroadcaster, LogEvent};
pub use config::{load_config, Config};
pub use dedup::{DuplicateAnalyzer, PhoneNormalizer};
pub use error::{
    ConfigError, IngestError, JobError, LeadfillError, Result, SessionError, SetupError,
};
pub use ingest::{Batch, IngestReport, Ingestor, Record};
pub use job::{JobController, JobSnapshot, JobStatus};
pub use mapper::{CanonicalField, FieldMapping, SchemaMapper};
pub use submission::{FormProfile, SubmissionEngine, SubmissionOutcome};
