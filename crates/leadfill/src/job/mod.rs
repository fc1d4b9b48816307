//! Job Controller: one job at a time, cooperative cancellation, and a
//! snapshot-only view of progress.

pub mod cancel;
pub mod controller;
pub mod state;

pub use cancel::CancelFlag;
pub use controller::{ControllerConfig, JobController};
pub use state::{
    FailureStage, JobFailure, JobLog, JobSnapshot, JobState, JobStatus, LogEntry, LogLevel,
};
