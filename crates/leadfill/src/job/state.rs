//! Job lifecycle state, the bounded job log, and the snapshot handed to
//! status readers.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the single job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    /// Cancelled by the operator.
    Stopped,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Stopped | JobStatus::Completed | JobStatus::Failed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Stopped => write!(f, "stopped"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// 0-based batch position for per-record lines; `None` for job-level
    /// lines (setup, completion, cancellation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_index: Option<usize>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, record_index: Option<usize>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            record_index,
        }
    }
}

/// Ordered log that keeps only the newest `capacity` entries.
#[derive(Debug, Clone)]
pub struct JobLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl JobLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Same entries under a new capacity; the oldest are dropped if needed.
    pub fn resized(self, capacity: usize) -> Self {
        let mut log = JobLog::new(capacity);
        for entry in self.entries {
            log.push(entry);
        }
        log
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Session start, navigation or probe; no record was attempted.
    Setup,
    /// The record loop itself aborted.
    Processing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub stage: FailureStage,
    pub message: String,
}

/// Mutable job state. Owned by the controller; readers get a [`JobSnapshot`].
#[derive(Debug, Clone)]
pub struct JobState {
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub source_name: Option<String>,
    pub current_index: usize,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub duplicate_phones: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure: Option<JobFailure>,
    pub log: JobLog,
}

impl JobState {
    pub fn idle(log_capacity: usize) -> Self {
        Self {
            job_id: None,
            status: JobStatus::Idle,
            source_name: None,
            current_index: 0,
            total: 0,
            success_count: 0,
            error_count: 0,
            duplicate_phones: Vec::new(),
            started_at: None,
            finished_at: None,
            failure: None,
            log: JobLog::new(log_capacity),
        }
    }

    /// Fresh running state; counters start at zero.
    pub fn running(
        job_id: String,
        source_name: Option<String>,
        total: usize,
        duplicate_phones: Vec<String>,
        log: JobLog,
    ) -> Self {
        Self {
            job_id: Some(job_id),
            status: JobStatus::Running,
            source_name,
            current_index: 0,
            total,
            success_count: 0,
            error_count: 0,
            duplicate_phones,
            started_at: Some(Utc::now()),
            finished_at: None,
            failure: None,
            log,
        }
    }

    /// Counts one finished record.
    pub fn record_attempt(&mut self, index: usize, success: bool) {
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.current_index = index + 1;
    }

    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, stage: FailureStage, message: impl Into<String>) {
        self.failure = Some(JobFailure {
            stage,
            message: message.into(),
        });
        self.finish(JobStatus::Failed);
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            running: self.status.is_running(),
            source_name: self.source_name.clone(),
            current_index: self.current_index,
            total: self.total,
            success_count: self.success_count,
            error_count: self.error_count,
            duplicate_phones: self.duplicate_phones.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            failure: self.failure.clone(),
            log: self.log.iter().cloned().collect(),
        }
    }
}

/// Consistent copy of the job state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    pub current_index: usize,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub duplicate_phones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    pub log: Vec<LogEntry>,
}

impl JobSnapshot {
    /// Log lines written for individual records.
    pub fn record_lines(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter().filter(|e| e.record_index.is_some())
    }
}
