//! Hub relay.
//!
//! The hub bridges a client session and a broker session. Orders travelling
//! client to broker get a fresh synthetic ClOrdID, with the client's value
//! stashed in SecondaryClOrdID (526); replies travelling back have ClOrdID
//! restored from the stash. Two clients replaying the same script therefore
//! look distinct to the broker, and each still sees its own identifiers.
//!
//! The relay never blocks and never queues: a message whose destination is
//! not logged on is dropped.
//!
//! # Invariants
//!
//! - Synthetic IDs are unique within one hub process
//! - A dropped message leaves the correlation table untouched
//! - The table is an in-flight ledger only; ClOrdID restoration reads the
//!   stash, never the table

use std::{
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use fixsim_proto::{Dictionary, Message, tags};
use tracing::{debug, info, warn};

use crate::{
    audit::AuditSink,
    env::Environment,
    error::RelayError,
    matcher::correlation_suffix,
    session::{Application, Reject, SessionId, SessionLayer},
};

/// CompIDs of the two bridged counterparties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// CompID the client logs on with
    pub client_comp_id: String,
    /// CompID the broker logs on with
    pub broker_comp_id: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { client_comp_id: "CLIENT".to_string(), broker_comp_id: "BROKER".to_string() }
    }
}

/// Which bridged counterparty a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Order sender
    Client,
    /// Order receiver
    Broker,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("CLIENT"),
            Self::Broker => f.write_str("BROKER"),
        }
    }
}

/// Synthetic ClOrdID source: a per-process stamp followed by a counter.
#[derive(Debug)]
pub struct SyntheticIdGenerator {
    stamp: u32,
    next: AtomicU64,
}

impl SyntheticIdGenerator {
    /// Generator with an explicit stamp.
    pub fn new(stamp: u32) -> Self {
        Self { stamp, next: AtomicU64::new(1) }
    }

    /// Generator stamped from the environment's clock and RNG.
    pub fn from_env<E: Environment>(env: &E) -> Self {
        let mixed = env.wall_clock_millis() ^ env.random_u64();
        Self::new(u32::try_from(mixed & u64::from(u32::MAX)).unwrap_or_default())
    }

    /// Next identifier, e.g. `5F3A09C1000001`.
    pub fn next_id(&self) -> String {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{:08X}{seq:06}", self.stamp)
    }
}

/// In-flight requests, keyed by synthetic ClOrdID.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: DashMap<String, String>,
}

impl CorrelationTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `synthetic -> original`.
    pub fn insert(&self, synthetic: String, original: String) {
        if let Some(previous) = self.entries.insert(synthetic.clone(), original) {
            warn!(synthetic, previous, "synthetic id reused");
        }
    }

    /// Retire the entry for `synthetic`, returning its original ID.
    pub fn retire(&self, synthetic: &str) -> Option<String> {
        self.entries.remove(synthetic).map(|(_, original)| original)
    }

    /// Whether `synthetic` is in flight.
    pub fn contains(&self, synthetic: &str) -> bool {
        self.entries.contains_key(synthetic)
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The hub's [`Application`].
pub struct HubRelay {
    config: HubConfig,
    sessions: Arc<dyn SessionLayer>,
    audit: Arc<dyn AuditSink>,
    dictionary: Dictionary,
    ids: SyntheticIdGenerator,
    table: CorrelationTable,
    client_session: RwLock<Option<SessionId>>,
    broker_session: RwLock<Option<SessionId>>,
}

impl HubRelay {
    /// Relay between the counterparties named in `config`.
    pub fn new<E: Environment>(
        config: HubConfig,
        env: &E,
        sessions: Arc<dyn SessionLayer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            sessions,
            audit,
            dictionary: Dictionary::default(),
            ids: SyntheticIdGenerator::from_env(env),
            table: CorrelationTable::new(),
            client_session: RwLock::new(None),
            broker_session: RwLock::new(None),
        }
    }

    /// Use `dictionary` when re-parsing forwarded messages.
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Dictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// In-flight correlation entries.
    pub fn correlations(&self) -> &CorrelationTable {
        &self.table
    }

    /// Counterparty behind a local session, by its target CompID.
    pub fn side_of(&self, session: &SessionId) -> Option<Side> {
        let target = session.target_comp_id();
        if target == self.config.client_comp_id {
            Some(Side::Client)
        } else if target == self.config.broker_comp_id {
            Some(Side::Broker)
        } else {
            None
        }
    }

    fn slot(&self, side: Side) -> &RwLock<Option<SessionId>> {
        match side {
            Side::Client => &self.client_session,
            Side::Broker => &self.broker_session,
        }
    }

    fn remember(&self, session: &SessionId) {
        if let Some(side) = self.side_of(session) {
            *self.slot(side).write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        }
    }

    /// Whether the counterparty on `side` is logged on.
    pub fn is_online(&self, side: Side) -> bool {
        self.online(side).is_ok()
    }

    /// Session for `side`, if it is logged on.
    fn online(&self, side: Side) -> Result<SessionId, RelayError> {
        let known = self.slot(side).read().unwrap_or_else(PoisonError::into_inner).clone();
        known
            .filter(|session| self.sessions.is_logged_on(session))
            .ok_or_else(|| RelayError::TargetOffline(side.to_string()))
    }

    fn relay(&self, message: Message, from: Side) -> Result<(), RelayError> {
        match from {
            Side::Client => self.client_to_broker(message),
            Side::Broker => self.broker_to_client(message),
        }
    }

    fn client_to_broker(&self, mut message: Message) -> Result<(), RelayError> {
        let target = self.online(Side::Broker)?;

        let original = message.get(tags::CL_ORD_ID).map(str::to_owned);
        let synthetic = original.as_ref().map(|original| {
            let synthetic = self.ids.next_id();
            message.set(tags::SECONDARY_CL_ORD_ID, original.as_str());
            message.set(tags::CL_ORD_ID, synthetic.as_str());
            synthetic
        });

        let forward = self.reparse(&message)?;
        if let (Some(synthetic), Some(original)) = (&synthetic, original) {
            debug!(synthetic, original, "correlation recorded");
            self.table.insert(synthetic.clone(), original);
        }

        self.sessions.send(forward, &target).inspect_err(|_| {
            if let Some(synthetic) = &synthetic {
                self.table.retire(synthetic);
            }
        })?;
        Ok(())
    }

    fn broker_to_client(&self, mut message: Message) -> Result<(), RelayError> {
        let target = self.online(Side::Client)?;

        if let Some(stashed) = message.remove(tags::SECONDARY_CL_ORD_ID) {
            if let Some(synthetic) = message.get(tags::CL_ORD_ID)
                && self.table.retire(synthetic).is_some()
            {
                debug!(synthetic, "correlation retired");
            }
            message.set(tags::CL_ORD_ID, correlation_suffix(&stashed));
        } else if let Some(cl_ord_id) = message.get(tags::CL_ORD_ID)
            && self.table.retire(cl_ord_id).is_some()
        {
            debug!(cl_ord_id, "correlation retired without stash; forwarding synthetic id");
        }

        let forward = self.reparse(&message)?;
        self.sessions.send(forward, &target)?;
        Ok(())
    }

    /// Encode to wire text and parse it back.
    fn reparse(&self, message: &Message) -> Result<Message, RelayError> {
        Ok(Message::parse(&message.to_wire(), &self.dictionary)?)
    }
}

impl Application for HubRelay {
    fn on_create(&self, session: &SessionId) {
        match self.side_of(session) {
            Some(side) => debug!(%session, %side, "hub session created"),
            None => warn!(%session, "hub session for unknown counterparty"),
        }
    }

    fn on_logon(&self, session: &SessionId) {
        info!(%session, side = ?self.side_of(session), "hub logon");
        self.remember(session);
    }

    fn on_logout(&self, session: &SessionId) {
        warn!(%session, side = ?self.side_of(session), "hub logout");
    }

    fn from_app(&self, message: Message, session: &SessionId) -> Result<(), Reject> {
        let Some(from) = self.side_of(session) else {
            warn!(%session, "{}", RelayError::UnknownSession(session.to_string()));
            return Ok(());
        };
        self.remember(session);

        let msg_type = message.msg_type_str().unwrap_or_default().to_string();
        self.audit.publish(&format!("[{from}->HUB] Received 35={msg_type} message {}", message.pretty()));

        if let Err(err) = self.relay(message, from) {
            warn!(%session, msg_type, %err, "message dropped");
        }
        Ok(())
    }
}
