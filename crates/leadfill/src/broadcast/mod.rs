//! Live fan-out of job log lines to any number of subscribers.

pub mod log_broadcaster;

pub use log_broadcaster::{LogBroadcaster, LogEvent};
