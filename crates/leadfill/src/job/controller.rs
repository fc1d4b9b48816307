//! Job Controller: owns the single job slot, drives the submission engine
//! over a batch on a background task and publishes progress.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, log, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::automation::{probe, AutomationSession, SessionFactory};
use crate::broadcast::{LogBroadcaster, LogEvent};
use crate::config::Config;
use crate::error::{JobError, SetupError};
use crate::ingest::Batch;
use crate::sanitize;
use crate::submission::{EngineConfig, SubmissionContext, SubmissionEngine};

use super::cancel::CancelFlag;
use super::state::{FailureStage, JobLog, JobSnapshot, JobState, JobStatus, LogEntry, LogLevel};

/// Controller settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub target_url: String,
    pub probe: String,
    pub page_load: Duration,
    pub between_records: Duration,
    pub log_capacity: usize,
    pub retain_log_on_restart: bool,
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_url: config.target.url.clone(),
            probe: config.target.probe.clone(),
            page_load: config.timings.page_load(),
            between_records: config.timings.between_records(),
            log_capacity: config.job.log_capacity,
            retain_log_on_restart: config.job.retain_log_on_restart,
        }
    }
}

enum LoopEnd {
    Exhausted,
    Cancelled,
}

struct Inner {
    config: ControllerConfig,
    engine: SubmissionEngine,
    factory: Arc<dyn SessionFactory>,
    broadcaster: LogBroadcaster,
    state: RwLock<JobState>,
    cancel: Mutex<CancelFlag>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Runs at most one job at a time. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    pub fn new(config: &Config, factory: Arc<dyn SessionFactory>) -> Self {
        Self::with_broadcaster(config, factory, LogBroadcaster::default())
    }

    pub fn with_broadcaster(
        config: &Config,
        factory: Arc<dyn SessionFactory>,
        broadcaster: LogBroadcaster,
    ) -> Self {
        let controller_config = ControllerConfig::from_config(config);
        let state = JobState::idle(controller_config.log_capacity);
        Self {
            inner: Arc::new(Inner {
                config: controller_config,
                engine: SubmissionEngine::new(EngineConfig::from_config(config)),
                factory,
                broadcaster,
                state: RwLock::new(state),
                cancel: Mutex::new(CancelFlag::new()),
                handle: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.inner.broadcaster.subscribe()
    }

    /// Starts a job over `batch` on the current tokio runtime and returns its
    /// id. Rejected while another job is running; the running job is left
    /// untouched.
    pub fn start(&self, batch: Batch) -> Result<String, JobError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| JobError::NoRuntime)?;
        let job_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancelFlag::new();

        {
            let mut state = self.inner.write_state();
            if state.status.is_running() {
                return Err(JobError::AlreadyRunning);
            }
            let previous = std::mem::replace(&mut state.log, JobLog::new(1));
            let log = if self.inner.config.retain_log_on_restart {
                previous.resized(self.inner.config.log_capacity)
            } else {
                JobLog::new(self.inner.config.log_capacity)
            };
            *state = JobState::running(
                job_id.clone(),
                batch.source_name.clone(),
                batch.len(),
                batch.duplicate_phones.iter().cloned().collect(),
                log,
            );
            *self.inner.lock_cancel() = cancel.clone();
        }

        let span = info_span!(
            "job",
            job_id = %job_id,
            source = batch.source_name.as_deref().unwrap_or("unknown"),
            records = batch.len()
        );
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(
            async move {
                inner.run(batch, cancel).await;
            }
            .instrument(span),
        );
        *self.inner.lock_handle() = Some(handle);

        Ok(job_id)
    }

    /// Consistent copy of the current job state.
    pub fn status(&self) -> JobSnapshot {
        self.inner.read_state().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.inner.read_state().status.is_running()
    }

    /// Requests cooperative cancellation and returns immediately. Returns
    /// whether a job was running to receive it.
    pub fn cancel(&self) -> bool {
        let running = self.is_running();
        if running {
            self.inner.lock_cancel().cancel();
            debug!("Cancellation requested");
        }
        running
    }

    /// Waits for the background task of the last started job to end.
    pub async fn wait(&self) -> JobSnapshot {
        let handle = self.inner.lock_handle().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Job task ended abnormally: {}", e);
                self.inner.fail_if_running(FailureStage::Processing, e.to_string());
            }
        }
        self.status()
    }
}

impl Inner {
    /// Whole job body. A panic anywhere, setup included, ends the job
    /// `Failed` at the stage it was reached, and the session is closed on
    /// every path.
    async fn run(&self, batch: Batch, cancel: CancelFlag) {
        let mut session: Option<Box<dyn AutomationSession>> = None;
        let mut stage = FailureStage::Setup;

        let result = AssertUnwindSafe(self.drive(&batch, &cancel, &mut session, &mut stage))
            .catch_unwind()
            .await;

        if let Some(mut session) = session.take() {
            self.release(session.as_mut()).await;
        }

        match result {
            Ok(Ok(LoopEnd::Exhausted)) => self.finish(JobStatus::Completed),
            Ok(Ok(LoopEnd::Cancelled)) => self.finish(JobStatus::Stopped),
            Ok(Err(e)) => self.fail(FailureStage::Setup, e.to_string()),
            Err(panic) => self.fail(stage, panic_message(panic)),
        }
    }

    async fn drive(
        &self,
        batch: &Batch,
        cancel: &CancelFlag,
        session: &mut Option<Box<dyn AutomationSession>>,
        stage: &mut FailureStage,
    ) -> Result<LoopEnd, SetupError> {
        let total = batch.len();
        self.append(
            LogLevel::Info,
            format!(
                "Starting job for {} record(s) using {}",
                total,
                self.factory.describe()
            ),
            None,
        );
        if !batch.duplicate_phones.is_empty() {
            let phones: Vec<String> = batch
                .duplicate_phones
                .iter()
                .map(|p| sanitize::redact_phone(p))
                .collect();
            self.append(
                LogLevel::Warn,
                format!(
                    "Batch repeats {} phone number(s): {}",
                    phones.len(),
                    phones.join(", ")
                ),
                None,
            );
        }

        let created = self
            .factory
            .create()
            .await
            .map_err(SetupError::SessionStart)?;
        let session = session.insert(created);

        self.prepare(session.as_mut())
            .instrument(info_span!("setup"))
            .await?;

        *stage = FailureStage::Processing;
        Ok(self.process(session.as_mut(), batch, cancel).await)
    }

    /// Opens the target and checks that it loaded.
    async fn prepare(&self, session: &mut dyn AutomationSession) -> Result<(), SetupError> {
        let url = &self.config.target_url;
        session
            .open(url)
            .await
            .map_err(|source| SetupError::Navigation {
                url: sanitize::redact_url(url),
                source,
            })?;
        if !self.config.page_load.is_zero() {
            tokio::time::sleep(self.config.page_load).await;
        }

        let loaded = probe(session, &self.config.probe)
            .await
            .map_err(|source| SetupError::Navigation {
                url: sanitize::redact_url(url),
                source,
            })?;
        if !loaded {
            return Err(SetupError::ProbeFailed {
                expected: self.config.probe.clone(),
            });
        }
        self.append(
            LogLevel::Info,
            format!("Target loaded: {}", sanitize::redact_url(url)),
            None,
        );
        Ok(())
    }

    async fn process(
        &self,
        session: &mut dyn AutomationSession,
        batch: &Batch,
        cancel: &CancelFlag,
    ) -> LoopEnd {
        let total = batch.len();
        let mut attempted: HashSet<String> = HashSet::new();

        for (index, record) in batch.records.iter().enumerate() {
            if cancel.is_cancelled() {
                self.append(
                    LogLevel::Warn,
                    format!("Cancelled after {} of {} record(s)", index, total),
                    None,
                );
                return LoopEnd::Cancelled;
            }

            let phone = batch.normalizer().normalize(&record.phone);
            let repeated = !attempted.insert(phone.clone());
            let report = self
                .engine
                .submit(session, SubmissionContext::new(record, phone, repeated))
                .await;
            for note in &report.notes {
                debug!("Row {}: {}", record.row_number, note);
            }

            let success = report.outcome.is_success();
            let level = if success {
                LogLevel::Info
            } else {
                LogLevel::Warn
            };
            let line = format!(
                "[{}/{}] Row {} {} {}: {}",
                index + 1,
                total,
                record.row_number,
                record.label(),
                sanitize::redact_phone(&record.phone),
                report.summary()
            );
            self.update(level, line, Some(index), |s| {
                s.record_attempt(index, success)
            });

            if index + 1 < total
                && !cancel.is_cancelled()
                && !self.config.between_records.is_zero()
            {
                tokio::time::sleep(self.config.between_records).await;
            }
        }
        LoopEnd::Exhausted
    }

    async fn release(&self, session: &mut dyn AutomationSession) {
        if let Err(e) = session.close().await {
            warn!("Failed to close automation session: {}", e);
        }
    }

    fn fail(&self, stage: FailureStage, message: String) {
        let line = match stage {
            FailureStage::Setup => format!("Setup failed, no records attempted: {}", message),
            FailureStage::Processing => format!("Job aborted: {}", message),
        };
        self.update(LogLevel::Error, line, None, |s| s.fail(stage, message.clone()));
    }

    fn fail_if_running(&self, stage: FailureStage, message: String) {
        let running = self.read_state().status.is_running();
        if running {
            self.fail(stage, message);
        }
    }

    fn finish(&self, status: JobStatus) {
        let line = {
            let state = self.read_state();
            format!(
                "Job {}: {} succeeded, {} failed, {} of {} processed",
                status, state.success_count, state.error_count, state.current_index, state.total
            )
        };
        self.update(LogLevel::Info, line, None, |s| s.finish(status));
    }

    fn append(&self, level: LogLevel, message: String, record_index: Option<usize>) {
        self.update(level, message, record_index, |_| {});
    }

    /// Applies a state change and its log line under one write lock, then
    /// mirrors the line to the log facade and the broadcaster.
    fn update(
        &self,
        level: LogLevel,
        message: String,
        record_index: Option<usize>,
        change: impl FnOnce(&mut JobState),
    ) {
        let entry = LogEntry::new(level, message, record_index);
        let job_id = {
            let mut state = self.write_state();
            change(&mut state);
            state.log.push(entry.clone());
            state.job_id.clone()
        };
        log!(log::Level::from(level), "{}", entry.message);
        self.broadcaster
            .send(LogEvent::from_entry(job_id.as_deref(), &entry));
    }

    fn read_state(&self) -> RwLockReadGuard<'_, JobState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("Job state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, JobState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("Job state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_cancel(&self) -> MutexGuard<'_, CancelFlag> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with a non-string payload".to_string()
    }
}
