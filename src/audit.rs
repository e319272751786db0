//! Audit records for applied setting changes.
//!
//! Every setting written by a patch produces one `SettingChange`. The applier
//! always writes a log line for it; hosts that want the records in-process
//! attach an `AuditSink`. The channel sink never blocks the simulation step:
//! a full or abandoned channel counts the record as dropped instead.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patch::SettingValue;
use crate::time::TriggerTime;

/// One overwritten or inserted setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChange {
    /// Simulation time of the tick that applied the change.
    pub time: f64,
    /// Schedule entry the change came from.
    pub trigger: TriggerTime,
    /// Section name.
    pub section: String,
    /// Setting name.
    pub setting: String,
    /// Value before the write; `None` if the setting was inserted.
    pub previous: Option<Value>,
    /// Value written.
    pub value: SettingValue,
    /// Wall-clock time the change was made.
    pub recorded_at: DateTime<Utc>,
}

impl SettingChange {
    /// Returns true if the setting did not exist before.
    #[must_use]
    pub const fn is_insert(&self) -> bool {
        self.previous.is_none()
    }
}

impl fmt::Display for SettingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time = {}: Switched {}::{} to {}",
            self.time, self.section, self.setting, self.value
        )
    }
}

/// Receiver of setting changes.
pub trait AuditSink: Send + Sync {
    /// Called once per change, in application order. Must not block.
    fn record(&self, change: &SettingChange);
}

/// Streams changes into a bounded channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<SettingChange>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Creates a sink and the stream that reads from it.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, AuditStream) {
        let (tx, rx) = bounded(capacity.max(1));
        let sink = Self {
            tx,
            dropped: AtomicU64::new(0),
        };
        (sink, AuditStream { rx })
    }

    /// Records that could not be delivered.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AuditSink for ChannelSink {
    fn record(&self, change: &SettingChange) {
        match self.tx.try_send(change.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Read side of a `ChannelSink`.
#[derive(Debug)]
pub struct AuditStream {
    rx: Receiver<SettingChange>,
}

impl AuditStream {
    /// Next change, if one is already queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<SettingChange> {
        self.rx.try_recv().ok()
    }

    /// Next change, waiting up to `timeout`. `None` on timeout or when the
    /// sink is gone and the queue is empty.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SettingChange> {
        match self.rx.recv_timeout(timeout) {
            Ok(change) => Some(change),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now.
    #[must_use]
    pub fn drain(&self) -> Vec<SettingChange> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(setting: &str) -> SettingChange {
        SettingChange {
            time: 10.0,
            trigger: TriggerTime::new(10.0).unwrap(),
            section: "ddtSchemes".to_string(),
            setting: setting.to_string(),
            previous: Some(json!("steadyState")),
            value: SettingValue::new("Euler"),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_is_operator_line() {
        assert_eq!(
            change("default").to_string(),
            "Time = 10: Switched ddtSchemes::default to Euler"
        );
    }

    #[test]
    fn test_is_insert() {
        let mut c = change("default");
        assert!(!c.is_insert());
        c.previous = None;
        assert!(c.is_insert());
    }

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, stream) = ChannelSink::new(8);
        sink.record(&change("a"));
        sink.record(&change("b"));
        let got: Vec<String> = stream.drain().into_iter().map(|c| c.setting).collect();
        assert_eq!(got, vec!["a", "b"]);
        assert!(stream.try_recv().is_none());
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_channel_sink_counts_drops_when_full() {
        let (sink, stream) = ChannelSink::new(1);
        sink.record(&change("a"));
        sink.record(&change("b"));
        assert_eq!(sink.dropped(), 1);
        assert_eq!(stream.recv_timeout(Duration::from_millis(10)).unwrap().setting, "a");
    }

    #[test]
    fn test_channel_sink_counts_drops_when_disconnected() {
        let (sink, stream) = ChannelSink::new(4);
        drop(stream);
        sink.record(&change("a"));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_stream_times_out_when_empty() {
        let (_sink, stream) = ChannelSink::new(4);
        assert!(stream.recv_timeout(Duration::from_millis(5)).is_none());
    }
}
