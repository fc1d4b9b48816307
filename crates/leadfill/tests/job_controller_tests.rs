//! Job lifecycle scenarios against the simulated form and purpose-built fake
//! sessions.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use common::{batch_of, distinct_batch, ConfigBuilder};
use leadfill::automation::{
    AutomationSession, ElementHandle, Key, Locator, SessionFactory, SimulatedOptions,
    SimulatedTarget,
};
use leadfill::job::{FailureStage, JobController, JobSnapshot, JobStatus};
use leadfill::{JobError, SessionError};

fn controller_for(target: &SimulatedTarget) -> JobController {
    JobController::new(&ConfigBuilder::new().build(), Arc::new(target.clone()))
}

#[tokio::test]
async fn test_counters_cover_every_record() {
    let target = SimulatedTarget::with_options(SimulatedOptions {
        registered_phones: vec!["11922220000".to_string()],
        ..Default::default()
    });
    let controller = controller_for(&target);

    controller
        .start(batch_of(&["11911110000", "11922220000", "11933330000"]))
        .unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert!(!snapshot.running);
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.current_index, 3);
    assert_eq!(snapshot.success_count, 2);
    assert_eq!(snapshot.error_count, 1);
    assert_eq!(snapshot.success_count + snapshot.error_count, snapshot.total);
    assert_eq!(snapshot.record_lines().count(), 3);
    assert!(snapshot.log.iter().any(|e| e.message.contains("already registered")));
    assert_eq!(target.submissions().len(), 2);
}

fn assert_counters_consistent(snapshot: &JobSnapshot) {
    assert!(
        snapshot.success_count + snapshot.error_count <= snapshot.total,
        "{} + {} > {}",
        snapshot.success_count,
        snapshot.error_count,
        snapshot.total
    );
    assert_eq!(
        snapshot.current_index,
        snapshot.success_count + snapshot.error_count
    );
}

#[tokio::test]
async fn test_counters_consistent_at_every_point_of_a_run() {
    let target = SimulatedTarget::with_options(SimulatedOptions {
        registered_phones: vec!["11922220000".to_string()],
        ..Default::default()
    });
    let config = ConfigBuilder::new().inter_record_millis(5).build();
    let controller = JobController::new(&config, Arc::new(target.clone()));

    let during_submit = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&during_submit);
    let hook_controller = controller.clone();
    target.on_submit(move |_| {
        sink.lock().unwrap().push(hook_controller.status());
    });

    controller
        .start(batch_of(&[
            "11911110000",
            "11922220000",
            "11933330000",
            "11944440000",
            "11955550000",
            "11966660000",
        ]))
        .unwrap();

    let mut polled = 0;
    loop {
        let snapshot = controller.status();
        assert_counters_consistent(&snapshot);
        polled += 1;
        if !snapshot.running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(polled > 1);

    let finished = controller.wait().await;
    assert_counters_consistent(&finished);
    assert_eq!(finished.success_count + finished.error_count, finished.total);

    let during_submit = during_submit.lock().unwrap();
    assert_eq!(during_submit.len(), 5);
    for (n, snapshot) in during_submit.iter().enumerate() {
        assert!(snapshot.running);
        assert_counters_consistent(snapshot);
        // The record being submitted is not counted yet
        assert!(snapshot.current_index >= n);
        assert!(snapshot.current_index < snapshot.total);
    }
}

#[tokio::test]
async fn test_second_start_rejected_while_running() {
    let target = SimulatedTarget::new();
    let config = ConfigBuilder::new().inter_record_millis(50).build();
    let controller = JobController::new(&config, Arc::new(target.clone()));

    controller.start(distinct_batch(4)).unwrap();
    let before = controller.status();

    let rejected = controller.start(distinct_batch(1));
    assert_eq!(rejected, Err(JobError::AlreadyRunning));
    assert_eq!(JobError::AlreadyRunning.to_string(), "already running");

    let during = controller.status();
    assert_eq!(during.job_id, before.job_id);
    assert_eq!(during.total, 4);
    assert_counters_consistent(&during);

    let snapshot = controller.wait().await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.success_count, 4);
    assert_eq!(target.sessions_created(), 1);
}

#[tokio::test]
async fn test_cancel_stops_at_next_record_boundary() {
    let target = SimulatedTarget::new();
    let controller = controller_for(&target);

    let hook_controller = controller.clone();
    target.on_submit(move |count| {
        if count == 2 {
            hook_controller.cancel();
        }
    });

    controller.start(distinct_batch(5)).unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.status, JobStatus::Stopped);
    assert_eq!(snapshot.current_index, 2);
    assert_eq!(snapshot.success_count, 2);
    assert_eq!(target.submissions().len(), 2);
    let indexes: Vec<usize> = snapshot.record_lines().filter_map(|e| e.record_index).collect();
    assert_eq!(indexes, vec![0, 1]);
    assert_eq!(target.sessions_closed(), 1);
}

#[tokio::test]
async fn test_unreachable_target_fails_setup() {
    let target = SimulatedTarget::with_options(SimulatedOptions {
        fail_open: true,
        ..Default::default()
    });
    let controller = controller_for(&target);

    controller.start(distinct_batch(3)).unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.success_count, 0);
    assert_eq!(snapshot.error_count, 0);
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.record_lines().count(), 0);
    let failure = snapshot.failure.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Setup);
    assert!(failure.message.contains("could not open target"));
    assert_eq!(target.sessions_closed(), 1);
}

#[tokio::test]
async fn test_session_start_failure_fails_setup() {
    let target = SimulatedTarget::with_options(SimulatedOptions {
        fail_session: true,
        ..Default::default()
    });
    let controller = controller_for(&target);

    controller.start(distinct_batch(2)).unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.failure.as_ref().unwrap().stage, FailureStage::Setup);
    assert_eq!(snapshot.record_lines().count(), 0);
}

#[tokio::test]
async fn test_crashed_session_counts_errors_and_continues() {
    let target = SimulatedTarget::with_options(SimulatedOptions {
        crash_after_submissions: Some(1),
        ..Default::default()
    });
    let controller = controller_for(&target);

    controller.start(distinct_batch(3)).unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.success_count, 1);
    assert_eq!(snapshot.error_count, 2);
    assert!(snapshot
        .record_lines()
        .skip(1)
        .all(|e| e.message.contains("session error")));
}

#[tokio::test]
async fn test_repeated_phone_precheck_skips_later_occurrences() {
    let target = SimulatedTarget::new();
    let config = ConfigBuilder::new().skip_repeated_phones(true).build();
    let controller = JobController::new(&config, Arc::new(target.clone()));

    controller
        .start(batch_of(&["+5511999990000", "11988887777", "11 99999-0000"]))
        .unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.duplicate_phones, vec!["11999990000".to_string()]);
    assert_eq!(snapshot.success_count, 2);
    assert_eq!(snapshot.error_count, 1);
    assert_eq!(target.submissions().len(), 2);
}

#[tokio::test]
async fn test_log_is_bounded_and_broadcast() {
    let target = SimulatedTarget::new();
    let config = ConfigBuilder::new().log_capacity(3).build();
    let controller = JobController::new(&config, Arc::new(target));
    let mut events = controller.subscribe();

    let job_id = controller.start(distinct_batch(6)).unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.log.len(), 3);
    assert!(snapshot.log.last().unwrap().message.starts_with("Job completed"));

    let mut received = 0;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.job_id.as_deref(), Some(job_id.as_str()));
        received += 1;
    }
    assert!(received > snapshot.log.len());
}

// ─── Fake sessions ──────────────────────────────────────────────────────────

/// Where a fake session blows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanicAt {
    /// Inside `SessionFactory::create`, before any session exists.
    Create,
    /// While the target page title is read during setup.
    TitleLookup,
    /// On the first element lookup of the first record.
    ElementLookup,
}

struct PanickingSession {
    at: PanicAt,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl AutomationSession for PanickingSession {
    async fn open(&mut self, _url: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn page_title(&mut self) -> Result<String, SessionError> {
        if self.at == PanicAt::TitleLookup {
            panic!("title lookup bug");
        }
        Ok("Cadastro de Leads".to_string())
    }

    async fn page_text(&mut self) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn find_elements(
        &mut self,
        _locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError> {
        panic!("driver bug");
    }

    async fn is_visible(&mut self, _element: &ElementHandle) -> Result<bool, SessionError> {
        Ok(true)
    }

    async fn is_enabled(&mut self, _element: &ElementHandle) -> Result<bool, SessionError> {
        Ok(true)
    }

    async fn element_text(&mut self, _element: &ElementHandle) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn clear(&mut self, _element: &ElementHandle) -> Result<(), SessionError> {
        Ok(())
    }

    async fn type_text(&mut self, _element: &ElementHandle, _text: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn press_key(&mut self, _element: &ElementHandle, _key: Key) -> Result<(), SessionError> {
        Ok(())
    }

    async fn click(&mut self, _element: &ElementHandle) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct PanickingFactory {
    at: PanicAt,
    closed: Arc<AtomicUsize>,
}

impl PanickingFactory {
    fn new(at: PanicAt) -> (Self, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let factory = Self {
            at,
            closed: Arc::clone(&closed),
        };
        (factory, closed)
    }
}

#[async_trait]
impl SessionFactory for PanickingFactory {
    async fn create(&self) -> Result<Box<dyn AutomationSession>, SessionError> {
        if self.at == PanicAt::Create {
            panic!("driver launch bug");
        }
        Ok(Box::new(PanickingSession {
            at: self.at,
            closed: Arc::clone(&self.closed),
        }))
    }

    fn describe(&self) -> String {
        "panicking session".to_string()
    }
}

/// Polls `status()` until the job leaves `Running`, without `wait()`.
async fn settled_status(controller: &JobController) -> JobSnapshot {
    for _ in 0..200 {
        let snapshot = controller.status();
        if !snapshot.running {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job still running after 2s: {:?}", controller.status().status);
}

#[tokio::test]
async fn test_panic_in_record_loop_fails_job_and_releases_session() {
    let (factory, closed) = PanickingFactory::new(PanicAt::ElementLookup);
    let controller = JobController::new(&ConfigBuilder::new().build(), Arc::new(factory));

    controller.start(distinct_batch(2)).unwrap();
    let snapshot = controller.wait().await;

    assert_eq!(snapshot.status, JobStatus::Failed);
    let failure = snapshot.failure.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Processing);
    assert!(failure.message.contains("driver bug"));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panic_while_creating_session_fails_setup_without_wait() {
    let (factory, closed) = PanickingFactory::new(PanicAt::Create);
    let controller = JobController::new(&ConfigBuilder::new().build(), Arc::new(factory));

    controller.start(distinct_batch(2)).unwrap();
    let snapshot = settled_status(&controller).await;

    assert_eq!(snapshot.status, JobStatus::Failed);
    let failure = snapshot.failure.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Setup);
    assert!(failure.message.contains("driver launch bug"));
    assert_eq!(snapshot.record_lines().count(), 0);
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    // The slot is free again
    assert!(controller.start(distinct_batch(1)).is_ok());
    controller.wait().await;
}

#[tokio::test]
async fn test_panic_while_checking_target_fails_setup_and_releases_session() {
    let (factory, closed) = PanickingFactory::new(PanicAt::TitleLookup);
    let controller = JobController::new(&ConfigBuilder::new().build(), Arc::new(factory));

    controller.start(distinct_batch(2)).unwrap();
    let snapshot = settled_status(&controller).await;

    assert_eq!(snapshot.status, JobStatus::Failed);
    let failure = snapshot.failure.as_ref().unwrap();
    assert_eq!(failure.stage, FailureStage::Setup);
    assert!(failure.message.contains("title lookup bug"));
    assert!(snapshot
        .log
        .iter()
        .any(|e| e.message.starts_with("Setup failed, no records attempted")));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}
