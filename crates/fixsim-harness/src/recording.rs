//! Recorders for assertions.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use fixsim_core::{Application, AuditSink, Reject, SessionId};
use fixsim_proto::Message;

/// Audit sink that keeps every line.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines published so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Lines starting with `prefix`.
    pub fn lines_starting_with(&self, prefix: &str) -> Vec<String> {
        self.lines().into_iter().filter(|line| line.starts_with(prefix)).collect()
    }
}

impl AuditSink for RecordingSink {
    fn publish(&self, line: &str) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(line.to_string());
    }
}

/// Application that only records what reaches it.
///
/// Stands in for a counterparty when a test only cares about what was
/// delivered.
#[derive(Debug, Default)]
pub struct RecordingApp {
    received: Mutex<Vec<(SessionId, Message)>>,
    logons: AtomicUsize,
    logouts: AtomicUsize,
}

impl RecordingApp {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered through `from_app`, in order.
    pub fn received(&self) -> Vec<Message> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Number of `on_logon` calls.
    pub fn logons(&self) -> usize {
        self.logons.load(Ordering::SeqCst)
    }

    /// Number of `on_logout` calls.
    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl Application for RecordingApp {
    fn on_logon(&self, _session: &SessionId) {
        self.logons.fetch_add(1, Ordering::SeqCst);
    }

    fn on_logout(&self, _session: &SessionId) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }

    fn from_app(&self, message: Message, session: &SessionId) -> Result<(), Reject> {
        self.received.lock().unwrap_or_else(PoisonError::into_inner).push((session.clone(), message));
        Ok(())
    }
}
