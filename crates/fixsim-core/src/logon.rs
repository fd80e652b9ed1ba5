//! Logon tracking.

use tokio::sync::watch;

use crate::session::SessionId;

/// Snapshot of the role's session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogonState {
    /// Session the role is bound to, known from `on_create` onwards
    pub session: Option<SessionId>,
    /// Whether that session is currently logged on
    pub logged_on: bool,
}

/// Latch the session adapter flips and the runner waits on.
#[derive(Debug, Clone)]
pub struct LogonLatch {
    state: watch::Sender<LogonState>,
}

impl LogonLatch {
    /// Latch with no session.
    pub fn new() -> Self {
        Self { state: watch::Sender::new(LogonState::default()) }
    }

    /// Record the session without marking it logged on.
    pub fn created(&self, session: &SessionId) {
        self.state.send_modify(|state| {
            if state.session.is_none() {
                state.session = Some(session.clone());
            }
        });
    }

    /// Mark `session` logged on.
    pub fn logged_on(&self, session: &SessionId) {
        self.state.send_modify(|state| {
            state.session = Some(session.clone());
            state.logged_on = true;
        });
    }

    /// Mark `session` logged out. Ignored for other sessions.
    pub fn logged_out(&self, session: &SessionId) {
        self.state.send_if_modified(|state| {
            if state.logged_on && state.session.as_ref() == Some(session) {
                state.logged_on = false;
                true
            } else {
                false
            }
        });
    }

    /// Current state.
    pub fn state(&self) -> LogonState {
        self.state.borrow().clone()
    }

    /// Whether a session is logged on.
    pub fn is_logged_on(&self) -> bool {
        self.state.borrow().logged_on
    }

    /// Resolve once a session is logged on, returning it.
    ///
    /// Never resolves if no logon happens; callers bound it with a timeout.
    pub async fn wait(&self) -> Option<SessionId> {
        let mut receiver = self.state.subscribe();
        let state = receiver.wait_for(|state| state.logged_on).await.ok()?;
        state.session.clone()
    }
}

impl Default for LogonLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_logon() {
        let latch = LogonLatch::new();
        let session = SessionId::new("CLIENT", "HUB");
        latch.created(&session);
        assert!(!latch.is_logged_on());

        let waiter = latch.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });
        latch.logged_on(&session);

        assert_eq!(handle.await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_logged_on() {
        let latch = LogonLatch::new();
        let session = SessionId::new("BROKER", "HUB");
        latch.logged_on(&session);
        assert_eq!(latch.wait().await, Some(session));
    }

    #[test]
    fn logout_of_other_session_is_ignored() {
        let latch = LogonLatch::new();
        latch.logged_on(&SessionId::new("A", "B"));
        latch.logged_out(&SessionId::new("A", "C"));
        assert!(latch.is_logged_on());

        latch.logged_out(&SessionId::new("A", "B"));
        assert!(!latch.is_logged_on());
        assert_eq!(latch.state().session, Some(SessionId::new("A", "B")));
    }
}
