//! The single active expectation.
//!
//! The runner installs a template and waits on the returned receiver; the
//! session adapter offers every inbound message. Both completion paths (a
//! match, or the runner giving up) take the entry out of the slot, so a wait
//! completes at most once and a late message never resolves a stale wait.

use std::sync::{Mutex, MutexGuard, PoisonError};

use fixsim_proto::Message;
use tokio::sync::oneshot;

/// Template plus its completion signal.
#[derive(Debug)]
struct Expectation {
    template: Message,
    signal: oneshot::Sender<Message>,
}

/// Result of offering an inbound message to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The message satisfied the active template and the waiter was woken.
    Matched,
    /// An expectation is active but the message does not satisfy it.
    NoMatch,
    /// Nothing is waiting.
    Idle,
}

/// Mutex-guarded `Option<Expectation>`.
#[derive(Debug, Default)]
pub struct ExpectationSlot {
    inner: Mutex<Option<Expectation>>,
}

impl ExpectationSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot with `template`, replacing any previous expectation.
    ///
    /// The returned receiver yields the matching message.
    pub fn install(&self, template: Message) -> oneshot::Receiver<Message> {
        let (signal, receiver) = oneshot::channel();
        let previous = self.lock().replace(Expectation { template, signal });
        if previous.is_some() {
            tracing::warn!("expectation replaced while still armed");
        }
        receiver
    }

    /// Disarm the slot. Returns whether something was armed.
    pub fn clear(&self) -> bool {
        self.lock().take().is_some()
    }

    /// Whether an expectation is active.
    pub fn is_armed(&self) -> bool {
        self.lock().is_some()
    }

    /// Pipe-delimited form of the active template.
    pub fn template(&self) -> Option<String> {
        self.lock().as_ref().map(|e| e.template.pretty())
    }

    /// Check `actual` against the active template using `matcher`.
    ///
    /// On a match the expectation is removed and the waiter receives
    /// `actual`.
    pub fn offer<F>(&self, actual: &Message, matcher: F) -> Offer
    where
        F: FnOnce(&Message, &Message) -> bool,
    {
        let mut slot = self.lock();
        let Some(expectation) = slot.as_ref() else {
            return Offer::Idle;
        };
        if !matcher(&expectation.template, actual) {
            return Offer::NoMatch;
        }

        if let Some(expectation) = slot.take() {
            // Receiver dropped means the runner already gave up; the slot is
            // cleared either way.
            let _ = expectation.signal.send(actual.clone());
        }
        Offer::Matched
    }

    fn lock(&self) -> MutexGuard<'_, Option<Expectation>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
