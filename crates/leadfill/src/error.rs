use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadfillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Automation session error: {0}")]
    Session(#[from] SessionError),

    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid locator for '{field}': {reason}")]
    InvalidLocator { field: String, reason: String },
}

/// Failures while reading an uploaded spreadsheet.
///
/// Every variant is a `MalformedSource` condition from the operator's point of
/// view: ingestion yields an empty batch plus the error text as diagnostic.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read source file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed source '{path}': {reason}")]
    MalformedSource { path: PathBuf, reason: String },
}

impl IngestError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IngestError::MalformedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Automation session is not available: {0}")]
    Unavailable(String),

    #[error("WebDriver command '{command}' failed: {message}")]
    Protocol { command: String, message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to launch browser driver: {0}")]
    DriverLaunch(String),

    #[error("Automation session already closed")]
    Closed,
}

/// Conditions that abort a job before any record is attempted.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("could not start automation session: {0}")]
    SessionStart(#[source] SessionError),

    #[error("could not open target '{url}': {source}")]
    Navigation {
        url: String,
        #[source]
        source: SessionError,
    },

    #[error("target page did not load (expected to find '{expected}')")]
    ProbeFailed { expected: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("already running")]
    AlreadyRunning,

    #[error("no async runtime available to run the job")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, LeadfillError>;
