//! Log broadcasting for real-time log streaming.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::job::state::{LogEntry, LogLevel};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_index: Option<usize>,
    pub message: String,
}

impl LogEvent {
    /// Event mirroring a job log entry.
    pub fn from_entry(job_id: Option<&str>, entry: &LogEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            level: entry.level,
            job_id: job_id.map(str::to_string),
            record_index: entry.record_index,
            message: entry.message.clone(),
        }
    }
}

#[derive(Clone)]
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEvent>,
}

impl LogBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, event: LogEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = LogBroadcaster::new(10);
        let mut receiver = broadcaster.subscribe();

        let entry = LogEntry::new(LogLevel::Info, "Hello", None);
        broadcaster.send(LogEvent::from_entry(None, &entry));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.level, LogLevel::Info);
        assert_eq!(event.message, "Hello");
        assert!(event.job_id.is_none());
    }

    #[test]
    fn test_send_without_receivers_is_ignored() {
        let broadcaster = LogBroadcaster::new(1);
        let entry = LogEntry::new(LogLevel::Error, "nobody listening", None);
        broadcaster.send(LogEvent::from_entry(None, &entry));

        let mut late = broadcaster.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_event_from_entry() {
        let entry = LogEntry::new(LogLevel::Warn, "row 2 skipped", Some(0));
        let event = LogEvent::from_entry(Some("job-1"), &entry);
        assert_eq!(event.timestamp, entry.timestamp);
        assert_eq!(event.record_index, Some(0));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["level"], "warn");
        assert_eq!(json["recordIndex"], 0);
    }
}
