//! Session layer seam.
//!
//! The harness never talks to sockets. It sees sessions through two traits:
//!
//! - [`SessionLayer`]: the send primitive (`send(message, session)`)
//! - [`Application`]: callbacks the session layer invokes (`on_logon`,
//!   `on_logout`, `from_app`, `to_app`)
//!
//! [`SessionRegistry`] is the concrete send primitive used by both the TCP
//! transport and the in-memory simulation: each established session
//! registers an outbound queue together with its [`Application`]. `send`
//! runs `to_app` on the caller's task, so a veto is reported to the caller,
//! and only then queues the message for whoever encodes and delivers it.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, PoisonError, RwLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use fixsim_proto::{DEFAULT_BEGIN_STRING, Message, Tag};
use thiserror::Error;
use tokio::sync::mpsc;

/// Identity of one live session, as seen from the local side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    begin_string: String,
    sender_comp_id: String,
    target_comp_id: String,
}

impl SessionId {
    /// Session with the default BeginString.
    pub fn new(sender_comp_id: impl Into<String>, target_comp_id: impl Into<String>) -> Self {
        Self {
            begin_string: DEFAULT_BEGIN_STRING.to_string(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
        }
    }

    /// Override the BeginString.
    #[must_use]
    pub fn with_begin_string(mut self, begin_string: impl Into<String>) -> Self {
        self.begin_string = begin_string.into();
        self
    }

    /// BeginString (tag 8).
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Our CompID.
    pub fn sender_comp_id(&self) -> &str {
        &self.sender_comp_id
    }

    /// The counterparty's CompID.
    pub fn target_comp_id(&self) -> &str {
        &self.target_comp_id
    }

    /// The same session as seen from the other end.
    #[must_use]
    pub fn counterpart(&self) -> Self {
        Self {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.target_comp_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.begin_string, self.sender_comp_id, self.target_comp_id)
    }
}

/// Why a send did not happen.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No session with this identity is registered (never logged on, or
    /// logged out).
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session's outbound queue has been dropped.
    #[error("session closed: {0}")]
    Closed(SessionId),

    /// The application's `to_app` refused the message.
    #[error("send vetoed on {session}: {reason}")]
    Vetoed {
        /// Session the message was meant for
        session: SessionId,
        /// Reason given by `to_app`
        reason: String,
    },
}

/// Structured rejection raised by `from_app`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rejected: {reason}")]
pub struct Reject {
    /// Human readable reason, carried in Text (58) of the reject
    pub reason: String,
    /// Tag the rejection refers to, if any
    pub ref_tag: Option<Tag>,
}

impl Reject {
    /// Reject without a reference tag.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into(), ref_tag: None }
    }
}

/// Veto returned by `to_app` to stop a message from being sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("do not send: {0}")]
pub struct DoNotSend(pub String);

/// The send primitive.
///
/// Implementations must not block: they queue the message and return.
pub trait SessionLayer: Send + Sync {
    /// Queue `message` on `session`.
    fn send(&self, message: Message, session: &SessionId) -> Result<(), SendError>;

    /// Whether `session` is currently registered.
    fn is_logged_on(&self, session: &SessionId) -> bool;
}

/// Callbacks invoked by the session layer.
///
/// Calls arrive on session tasks, concurrently with whatever else the
/// application is doing.
pub trait Application: Send + Sync {
    /// Session object created (before logon).
    fn on_create(&self, _session: &SessionId) {}

    /// Logon completed.
    fn on_logon(&self, session: &SessionId);

    /// Session logged out or dropped.
    fn on_logout(&self, session: &SessionId);

    /// Outbound application message about to be sent. May modify or veto it.
    fn to_app(&self, _message: &mut Message, _session: &SessionId) -> Result<(), DoNotSend> {
        Ok(())
    }

    /// Inbound application message.
    fn from_app(&self, message: Message, session: &SessionId) -> Result<(), Reject>;
}

/// Receiving end of a session's outbound queue.
///
/// Carries the generation it was registered under, so a task draining a
/// replaced queue can tell it is no longer current.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Message>,
    generation: u64,
}

impl OutboundQueue {
    /// Next queued message, or `None` once the session is unregistered.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Next queued message without waiting.
    pub fn try_recv(&mut self) -> Result<Message, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Registration this queue belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    tx: mpsc::UnboundedSender<Message>,
    app: Option<Weak<dyn Application>>,
}

/// Table of outbound queues, keyed by session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` without an application; sends are queued as is.
    ///
    /// Re-registering replaces the previous queue; the old writer sees its
    /// queue close.
    pub fn register(&self, session: SessionId) -> OutboundQueue {
        self.insert(session, None)
    }

    /// Register `session` with the application whose `to_app` sees every
    /// message sent on it.
    ///
    /// The registry holds the application weakly, so an application that
    /// sends through this registry does not keep itself alive.
    pub fn register_app(&self, session: SessionId, app: &Arc<dyn Application>) -> OutboundQueue {
        self.insert(session, Some(Arc::downgrade(app)))
    }

    /// Remove `session`. Returns whether it was registered.
    pub fn unregister(&self, session: &SessionId) -> bool {
        self.write().remove(session).is_some()
    }

    /// Remove `session` only if it is still the registration that handed
    /// out `generation`. Returns whether it was removed.
    pub fn unregister_generation(&self, session: &SessionId, generation: u64) -> bool {
        let mut sessions = self.write();
        match sessions.get(session) {
            Some(entry) if entry.generation == generation => {
                sessions.remove(session);
                true
            },
            _ => false,
        }
    }

    /// Registered sessions.
    pub fn sessions(&self) -> Vec<SessionId> {
        let mut sessions: Vec<_> =
            self.sessions.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        sessions.sort();
        sessions
    }

    fn insert(&self, session: SessionId, app: Option<Weak<dyn Application>>) -> OutboundQueue {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.write().insert(session.clone(), Entry { generation, tx, app });
        if previous.is_some() {
            tracing::warn!(%session, "session re-registered, previous queue dropped");
        }
        OutboundQueue { rx, generation }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionLayer for SessionRegistry {
    fn send(&self, mut message: Message, session: &SessionId) -> Result<(), SendError> {
        // Clone out of the lock: `to_app` may take locks of its own.
        let (tx, app) = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            let entry =
                sessions.get(session).ok_or_else(|| SendError::SessionNotFound(session.clone()))?;
            (entry.tx.clone(), entry.app.as_ref().and_then(Weak::upgrade))
        };
        if tx.is_closed() {
            return Err(SendError::Closed(session.clone()));
        }

        if let Some(app) = app {
            app.to_app(&mut message, session).map_err(|DoNotSend(reason)| {
                tracing::debug!(%session, %reason, "send vetoed");
                SendError::Vetoed { session: session.clone(), reason }
            })?;
        }
        tx.send(message).map_err(|_| SendError::Closed(session.clone()))
    }

    fn is_logged_on(&self, session: &SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .is_some_and(|entry| !entry.tx.is_closed())
    }
}

/// Overwrite 8/49/56 with the session's identity, as a session layer does
/// for every outbound message.
pub fn stamp_session_header(message: &mut Message, session: &SessionId) {
    let header = message.header_mut();
    header.set(fixsim_proto::tags::BEGIN_STRING, session.begin_string());
    header.set(fixsim_proto::tags::SENDER_COMP_ID, session.sender_comp_id());
    header.set(fixsim_proto::tags::TARGET_COMP_ID, session.target_comp_id());
}
