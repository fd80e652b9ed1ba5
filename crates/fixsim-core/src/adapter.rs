//! Session callback adapter.
//!
//! [`RoleApp`] is the [`Application`] a client or broker registers with its
//! session layer. It is the only component the session layer calls into: it
//! tracks logon, publishes audit lines, decorates outbound messages through
//! the role, resolves the runner's expectation and sends the role's unscripted
//! replies.

use std::sync::Arc;

use fixsim_proto::Message;
use tracing::{debug, info, warn};

use crate::{
    audit::AuditSink,
    env::Environment,
    expectation::{ExpectationSlot, Offer},
    logon::LogonLatch,
    matcher,
    role::Role,
    runner::ScenarioRunner,
    session::{Application, DoNotSend, Reject, SessionId, SessionLayer},
};

/// Role-generic [`Application`].
pub struct RoleApp<R: Role, E: Environment> {
    role: Arc<R>,
    env: E,
    sessions: Arc<dyn SessionLayer>,
    audit: Arc<dyn AuditSink>,
    slot: Arc<ExpectationSlot>,
    latch: LogonLatch,
}

impl<R: Role, E: Environment> RoleApp<R, E> {
    /// Adapter for `role`, replying through `sessions`.
    pub fn new(role: R, env: E, sessions: Arc<dyn SessionLayer>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            role: Arc::new(role),
            env,
            sessions,
            audit,
            slot: Arc::new(ExpectationSlot::new()),
            latch: LogonLatch::new(),
        }
    }

    /// The role.
    pub fn role(&self) -> &R {
        &self.role
    }

    /// Expectation slot fed by `from_app`.
    pub fn slot(&self) -> &Arc<ExpectationSlot> {
        &self.slot
    }

    /// Logon latch flipped by the session callbacks.
    pub fn latch(&self) -> &LogonLatch {
        &self.latch
    }

    /// Runner wired to this adapter, sending on `session`.
    pub fn runner(&self, session: SessionId) -> ScenarioRunner<R, E> {
        ScenarioRunner::new(
            self.role.clone(),
            self.env.clone(),
            self.sessions.clone(),
            self.slot.clone(),
            self.latch.clone(),
            session,
        )
    }

    fn publish(&self, direction: &str, message: &Message) {
        let msg_type = message.msg_type_str().unwrap_or_default();
        self.audit.publish(&format!(
            "{} {direction} 35={msg_type} {}",
            self.role.name(),
            message.pretty()
        ));
    }
}

impl<R: Role, E: Environment> Application for RoleApp<R, E> {
    fn on_create(&self, session: &SessionId) {
        debug!(role = self.role.name(), %session, "session created");
        self.latch.created(session);
    }

    fn on_logon(&self, session: &SessionId) {
        info!(role = self.role.name(), %session, "logon");
        self.latch.logged_on(session);
    }

    fn on_logout(&self, session: &SessionId) {
        warn!(role = self.role.name(), %session, "logout");
        self.latch.logged_out(session);
    }

    fn to_app(&self, message: &mut Message, session: &SessionId) -> Result<(), DoNotSend> {
        self.role.on_send(message, session)?;
        self.publish("sent", message);
        Ok(())
    }

    fn from_app(&self, message: Message, session: &SessionId) -> Result<(), Reject> {
        self.publish("received", &message);

        let profile = self.role.match_profile();
        match self.slot.offer(&message, |expected, actual| matcher::matches(profile, expected, actual)) {
            Offer::Matched => info!(role = self.role.name(), message = %message.pretty(), "MATCH"),
            Offer::NoMatch => info!(
                role = self.role.name(),
                message = %message.pretty(),
                expected = %self.slot.template().unwrap_or_default(),
                "NO_MATCH"
            ),
            Offer::Idle => debug!(role = self.role.name(), "no active expectation"),
        }

        if let Some(reply) = self.role.reply_to(&message, self.env.wall_clock_millis()) {
            debug!(role = self.role.name(), %session, reply = %reply.pretty(), "auto reply");
            if let Err(err) = self.sessions.send(reply, session) {
                warn!(role = self.role.name(), %session, %err, "auto reply not sent");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        future::Future,
        sync::{Mutex, PoisonError},
        time::{Duration, Instant},
    };

    use fixsim_proto::{Dictionary, MsgType, tags};

    use super::*;
    use crate::{
        role::{BrokerRole, ClientRole},
        session::SessionRegistry,
    };

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn wall_clock_millis(&self) -> u64 {
            42
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(7);
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl AuditSink for Lines {
        fn publish(&self, line: &str) {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).push(line.to_string());
        }
    }

    impl Lines {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn msg(text: &str) -> Message {
        Message::parse(&text.replace('|', "\u{1}"), &Dictionary::fix44()).unwrap()
    }

    #[test]
    fn outbound_orders_are_prefixed_and_audited() {
        let lines = Arc::new(Lines::default());
        let app = RoleApp::new(
            ClientRole::default(),
            FixedEnv,
            Arc::new(SessionRegistry::new()),
            lines.clone(),
        );
        let session = SessionId::new("CLIENT", "HUB");

        let mut order = msg("35=D|11=5|55=FOO");
        app.to_app(&mut order, &session).unwrap();

        assert_eq!(order.get(tags::CL_ORD_ID), Some("sim1-CLIENT-5"));
        let audited = lines.take();
        assert_eq!(audited.len(), 1);
        assert!(audited[0].starts_with("Client sent 35=D 8=FIX.4.4|"));
        assert!(audited[0].contains("|11=sim1-CLIENT-5|55=FOO|"));
    }

    #[test]
    fn inbound_match_resolves_expectation() {
        let lines = Arc::new(Lines::default());
        let app =
            RoleApp::new(ClientRole::default(), FixedEnv, Arc::new(SessionRegistry::new()), lines.clone());
        let mut receiver = app.slot().install(msg("35=8|11=5|39=0"));

        app.from_app(msg("35=8|11=9|39=0"), &SessionId::new("CLIENT", "HUB")).unwrap();
        assert!(app.slot().is_armed());

        app.from_app(msg("35=8|11=sim1-CLIENT-5|39=0"), &SessionId::new("CLIENT", "HUB")).unwrap();
        assert!(!app.slot().is_armed());
        assert_eq!(receiver.try_recv().unwrap().get(tags::CL_ORD_ID), Some("sim1-CLIENT-5"));

        let audited = lines.take();
        assert_eq!(audited.len(), 2);
        assert!(audited[0].starts_with("Client received 35=8 "));
    }

    #[test]
    fn broker_auto_ack_is_sent_on_the_inbound_session() {
        let registry = Arc::new(SessionRegistry::new());
        let session = SessionId::new("BROKER", "HUB");
        let mut queue = registry.register(session.clone());
        let app = RoleApp::new(
            BrokerRole::new().with_auto_ack(true),
            FixedEnv,
            registry,
            Arc::new(Lines::default()),
        );

        app.from_app(msg("35=D|11=1|55=FOO|54=1|38=10"), &session).unwrap();

        let ack = queue.try_recv().unwrap();
        assert_eq!(ack.msg_type(), Some(MsgType::ExecutionReport));
        assert_eq!(ack.get(tags::ORDER_ID), Some("ORD42"));
    }

    #[test]
    fn logon_callbacks_drive_the_latch() {
        let app = RoleApp::new(
            BrokerRole::new(),
            FixedEnv,
            Arc::new(SessionRegistry::new()),
            Arc::new(Lines::default()),
        );
        let session = SessionId::new("BROKER", "HUB");

        app.on_create(&session);
        assert!(!app.latch().is_logged_on());
        app.on_logon(&session);
        assert!(app.latch().is_logged_on());
        app.on_logout(&session);
        assert!(!app.latch().is_logged_on());
    }
}
