//! Role strategies.
//!
//! The client and broker simulators run the same engine. What differs is
//! captured by a [`Role`]: which way each message type points, how inbound
//! messages are matched, how long to wait, and how outbound messages are
//! decorated. The engine is generic over the role; there is no per-role copy
//! of the runner or adapter.

use std::time::Duration;

use fixsim_proto::{Message, MsgType, tags};

use crate::{
    matcher::{BROKER_PROFILE, CLIENT_PROFILE, MatchProfile},
    session::{DoNotSend, SessionId},
    step::StepKind,
};

/// Which end of the order flow a role sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perspective {
    /// Sends requests, receives execution reports.
    Client,
    /// Receives requests, sends execution reports.
    Broker,
}

impl Perspective {
    /// Map a MsgType to a step kind from this perspective.
    ///
    /// Requests (`D`, `G`, `F`) point one way and execution reports (`8`)
    /// the other; the two perspectives are mirror images. Anything else is
    /// `None`.
    pub fn classify(self, msg_type: &str) -> Option<StepKind> {
        let msg_type = MsgType::from_wire(msg_type)?;
        let (request, response) = match self {
            Self::Client => (StepKind::Outbound, StepKind::ExpectInbound),
            Self::Broker => (StepKind::ExpectInbound, StepKind::Outbound),
        };

        if msg_type.is_order_request() {
            Some(request)
        } else if msg_type == MsgType::ExecutionReport {
            Some(response)
        } else {
            None
        }
    }
}

/// Strategy injected into the scenario runner and session adapter.
pub trait Role: Send + Sync + 'static {
    /// Label used in audit lines ("Client", "Broker").
    fn name(&self) -> &'static str;

    /// Direction mapping for script lines.
    fn perspective(&self) -> Perspective;

    /// Step kind for a MsgType, `None` to skip the line.
    fn classify(&self, msg_type: &str) -> Option<StepKind> {
        self.perspective().classify(msg_type)
    }

    /// Tags checked when matching inbound messages.
    fn match_profile(&self) -> &MatchProfile;

    /// Ceiling for one EXPECT_INBOUND wait.
    fn default_wait(&self) -> Duration;

    /// Runner-side hook applied to scripted OUTBOUND messages before send.
    fn prepare_outbound(&self, _message: &mut Message, _session: &SessionId) {}

    /// Session-side hook applied to every outbound application message.
    fn on_send(&self, _message: &mut Message, _session: &SessionId) -> Result<(), DoNotSend> {
        Ok(())
    }

    /// Unscripted reply to an inbound message, if the role produces one.
    fn reply_to(&self, _inbound: &Message, _stamp_millis: u64) -> Option<Message> {
        None
    }
}

/// Default correlation prefix stamped by the client.
pub const DEFAULT_SIM_ID: &str = "sim1";

/// Scripted order sender.
///
/// Every outgoing request gets its ClOrdID rewritten to
/// `<sim_id>-<SenderCompID>-<ClOrdID>` so two clients replaying the same
/// script stay distinguishable behind a hub.
#[derive(Debug, Clone)]
pub struct ClientRole {
    sim_id: String,
}

impl ClientRole {
    /// Client with the given correlation prefix.
    pub fn new(sim_id: impl Into<String>) -> Self {
        Self { sim_id: sim_id.into() }
    }

    /// Correlation prefix.
    pub fn sim_id(&self) -> &str {
        &self.sim_id
    }
}

impl Default for ClientRole {
    fn default() -> Self {
        Self::new(DEFAULT_SIM_ID)
    }
}

impl Role for ClientRole {
    fn name(&self) -> &'static str {
        "Client"
    }

    fn perspective(&self) -> Perspective {
        Perspective::Client
    }

    fn match_profile(&self) -> &MatchProfile {
        &CLIENT_PROFILE
    }

    fn default_wait(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn on_send(&self, message: &mut Message, session: &SessionId) -> Result<(), DoNotSend> {
        if !message.msg_type().is_some_and(MsgType::is_order_request) {
            return Ok(());
        }
        let Some(cl_ord_id) = message.get(tags::CL_ORD_ID) else {
            return Err(DoNotSend(format!(
                "{} without ClOrdID",
                message.msg_type_str().unwrap_or_default()
            )));
        };
        let sender = message.sender_comp_id().unwrap_or(session.sender_comp_id());
        let prefixed = format!("{}-{sender}-{cl_ord_id}", self.sim_id);
        message.set(tags::CL_ORD_ID, prefixed);
        Ok(())
    }
}

/// Scripted counterparty.
///
/// Stamps missing 49/56 on scripted execution reports and, when `auto_ack`
/// is set, answers every NewOrderSingle with a `New` execution report.
#[derive(Debug, Clone, Default)]
pub struct BrokerRole {
    auto_ack: bool,
}

impl BrokerRole {
    /// Broker without auto acknowledgement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable auto acknowledgement.
    #[must_use]
    pub fn with_auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = auto_ack;
        self
    }

    /// Whether auto acknowledgement is on.
    pub fn auto_ack(&self) -> bool {
        self.auto_ack
    }
}

impl Role for BrokerRole {
    fn name(&self) -> &'static str {
        "Broker"
    }

    fn perspective(&self) -> Perspective {
        Perspective::Broker
    }

    fn match_profile(&self) -> &MatchProfile {
        &BROKER_PROFILE
    }

    // Longer than the client: the broker starts waiting before anyone has
    // sent an order.
    fn default_wait(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn prepare_outbound(&self, message: &mut Message, session: &SessionId) {
        if message.sender_comp_id().is_none() || message.target_comp_id().is_none() {
            let header = message.header_mut();
            header.set(tags::SENDER_COMP_ID, session.sender_comp_id());
            header.set(tags::TARGET_COMP_ID, session.target_comp_id());
        }
    }

    fn reply_to(&self, inbound: &Message, stamp_millis: u64) -> Option<Message> {
        if !self.auto_ack || inbound.msg_type() != Some(MsgType::NewOrderSingle) {
            return None;
        }
        Some(new_order_ack(inbound, stamp_millis))
    }
}

/// Execution report acknowledging `order` as `New`.
fn new_order_ack(order: &Message, stamp_millis: u64) -> Message {
    let mut report = Message::new(MsgType::ExecutionReport);
    report.set(tags::ORDER_ID, format!("ORD{stamp_millis}"));
    report.set(tags::EXEC_ID, format!("EXEC{stamp_millis}"));
    report.set(tags::EXEC_TYPE, "0");
    report.set(tags::ORD_STATUS, "0");
    for tag in [tags::SYMBOL, tags::SIDE] {
        if let Some(value) = order.get(tag) {
            report.set(tag, value);
        }
    }
    report.set(tags::LEAVES_QTY, order.get(tags::ORDER_QTY).unwrap_or("0"));
    report.set(tags::CUM_QTY, "0");
    report.set(tags::AVG_PX, "0");
    for tag in [tags::CL_ORD_ID, tags::SECONDARY_CL_ORD_ID] {
        if let Some(value) = order.get(tag) {
            report.set(tag, value);
        }
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fixsim_proto::Dictionary;

    use super::*;

    fn msg(text: &str) -> Message {
        Message::parse(&text.replace('|', "\u{1}"), &Dictionary::fix44()).unwrap()
    }

    #[test]
    fn classification_is_mirrored() {
        assert_eq!(Perspective::Client.classify("D"), Some(StepKind::Outbound));
        assert_eq!(Perspective::Broker.classify("D"), Some(StepKind::ExpectInbound));
        assert_eq!(Perspective::Client.classify("8"), Some(StepKind::ExpectInbound));
        assert_eq!(Perspective::Broker.classify("8"), Some(StepKind::Outbound));

        for msg_type in ["G", "F"] {
            assert_eq!(Perspective::Client.classify(msg_type), Some(StepKind::Outbound));
            assert_eq!(Perspective::Broker.classify(msg_type), Some(StepKind::ExpectInbound));
        }
    }

    #[test]
    fn unknown_and_admin_types_are_skipped() {
        for msg_type in ["A", "0", "9", "ZZ", ""] {
            assert_eq!(Perspective::Client.classify(msg_type), None);
            assert_eq!(Perspective::Broker.classify(msg_type), None);
        }
    }

    #[test]
    fn client_prefixes_order_requests() {
        let role = ClientRole::default();
        let session = SessionId::new("CLIENT", "HUB");
        let mut order = msg("35=D|11=123|55=FOO");

        role.on_send(&mut order, &session).unwrap();
        assert_eq!(order.get(tags::CL_ORD_ID), Some("sim1-CLIENT-123"));
    }

    #[test]
    fn client_prefers_declared_sender() {
        let role = ClientRole::new("simX");
        let session = SessionId::new("CLIENT", "HUB");
        let mut cancel = msg("35=F|49=DESK7|11=9|41=8");

        role.on_send(&mut cancel, &session).unwrap();
        assert_eq!(cancel.get(tags::CL_ORD_ID), Some("simX-DESK7-9"));
        assert_eq!(cancel.get(tags::ORIG_CL_ORD_ID), Some("8"));
    }

    #[test]
    fn client_leaves_other_messages_alone() {
        let role = ClientRole::default();
        let mut report = msg("35=8|11=123");
        role.on_send(&mut report, &SessionId::new("CLIENT", "HUB")).unwrap();
        assert_eq!(report.get(tags::CL_ORD_ID), Some("123"));
    }

    #[test]
    fn client_vetoes_order_without_cl_ord_id() {
        let role = ClientRole::default();
        let mut order = msg("35=D|55=FOO");
        assert!(role.on_send(&mut order, &SessionId::new("CLIENT", "HUB")).is_err());
    }

    #[test]
    fn broker_stamps_missing_identity() {
        let role = BrokerRole::new();
        let session = SessionId::new("BROKER", "HUB");
        let mut report = msg("35=8|11=1");

        role.prepare_outbound(&mut report, &session);
        assert_eq!(report.sender_comp_id(), Some("BROKER"));
        assert_eq!(report.target_comp_id(), Some("HUB"));
    }

    #[test]
    fn broker_keeps_declared_identity() {
        let role = BrokerRole::new();
        let mut report = msg("35=8|49=B2|56=H2|11=1");
        role.prepare_outbound(&mut report, &SessionId::new("BROKER", "HUB"));
        assert_eq!(report.sender_comp_id(), Some("B2"));
        assert_eq!(report.target_comp_id(), Some("H2"));
    }

    #[test]
    fn auto_ack_builds_new_execution_report() {
        let role = BrokerRole::new().with_auto_ack(true);
        let order = msg("35=D|11=777|526=sim1-CLIENT-5|55=FOO|54=2|38=100");

        let ack = role.reply_to(&order, 1_700_000_000_000).unwrap();
        assert_eq!(ack.msg_type(), Some(MsgType::ExecutionReport));
        assert_eq!(ack.get(tags::ORDER_ID), Some("ORD1700000000000"));
        assert_eq!(ack.get(tags::EXEC_TYPE), Some("0"));
        assert_eq!(ack.get(tags::ORD_STATUS), Some("0"));
        assert_eq!(ack.get(tags::SYMBOL), Some("FOO"));
        assert_eq!(ack.get(tags::SIDE), Some("2"));
        assert_eq!(ack.get(tags::LEAVES_QTY), Some("100"));
        assert_eq!(ack.get(tags::CL_ORD_ID), Some("777"));
        assert_eq!(ack.get(tags::SECONDARY_CL_ORD_ID), Some("sim1-CLIENT-5"));
    }

    #[test]
    fn no_reply_without_auto_ack_or_for_other_types() {
        let order = msg("35=D|11=1");
        assert!(BrokerRole::new().reply_to(&order, 0).is_none());
        let cancel = msg("35=F|11=2|41=1");
        assert!(BrokerRole::new().with_auto_ack(true).reply_to(&cancel, 0).is_none());
    }
}
