//! In-memory session network.
//!
//! A [`SimNode`] is one process: its [`SessionRegistry`] and its
//! [`Application`]. [`SimNetwork::connect`] establishes a session between two
//! nodes and spawns one pump per direction. A pump drains the sender's
//! outbound queue and does what a session writer and reader would: header
//! stamping, MsgSeqNum, wire encoding, framing, checksum verification and
//! `from_app` on the other side. `to_app` has already run inside
//! [`SessionRegistry`]'s `send`, so a veto never reaches a pump.
//!
//! Pumps are plain tokio tasks, so delivery happens whenever the sender
//! yields. Under a current-thread runtime the order is deterministic.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use fixsim_core::{Application, OutboundQueue, SessionId, SessionRegistry, stamp_session_header};
use fixsim_proto::{Dictionary, FrameDecoder, Message, tags, verify_checksum};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One simulated process.
#[derive(Clone)]
pub struct SimNode {
    registry: Arc<SessionRegistry>,
    app: Arc<dyn Application>,
}

impl SimNode {
    /// Node sending through `registry` and receiving into `app`.
    pub fn new(registry: Arc<SessionRegistry>, app: Arc<dyn Application>) -> Self {
        Self { registry, app }
    }

    /// The node's send primitive.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

/// Delivery counters for one direction of a link.
#[derive(Debug, Default)]
pub struct PumpStats {
    delivered: AtomicUsize,
    rejected: AtomicUsize,
}

impl PumpStats {
    /// Messages handed to the receiver's `from_app`.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Messages the receiver rejected.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

/// An established session between two nodes.
pub struct SimLink {
    initiator: SimNode,
    acceptor: SimNode,
    initiator_session: SessionId,
    acceptor_session: SessionId,
    outbound: Arc<PumpStats>,
    inbound: Arc<PumpStats>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl SimLink {
    /// The initiator's view of the session.
    pub fn initiator_session(&self) -> &SessionId {
        &self.initiator_session
    }

    /// The acceptor's view of the session.
    pub fn acceptor_session(&self) -> &SessionId {
        &self.acceptor_session
    }

    /// Initiator to acceptor counters.
    pub fn outbound(&self) -> &PumpStats {
        &self.outbound
    }

    /// Acceptor to initiator counters.
    pub fn inbound(&self) -> &PumpStats {
        &self.inbound
    }

    /// Tear the session down on both ends.
    ///
    /// Messages already queued are still delivered; nothing sent afterwards
    /// is.
    pub async fn disconnect(&self) {
        self.initiator.registry.unregister(&self.initiator_session);
        self.acceptor.registry.unregister(&self.acceptor_session);

        let pumps = std::mem::take(&mut *self.pumps.lock().unwrap_or_else(PoisonError::into_inner));
        for pump in pumps {
            if let Err(err) = pump.await {
                warn!(%err, "pump task failed");
            }
        }

        self.initiator.app.on_logout(&self.initiator_session);
        self.acceptor.app.on_logout(&self.acceptor_session);
    }
}

/// Factory for links.
#[derive(Debug, Clone, Default)]
pub struct SimNetwork {
    dictionary: Dictionary,
}

impl SimNetwork {
    /// Network using the default dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish a session from `initiator` to `acceptor`.
    ///
    /// `session` is the initiator's view; the acceptor sees its counterpart.
    /// Both applications get `on_create` then `on_logon`. Must be called from
    /// within a tokio runtime.
    pub fn connect(&self, initiator: &SimNode, acceptor: &SimNode, session: SessionId) -> SimLink {
        let acceptor_session = session.counterpart();
        initiator.app.on_create(&session);
        acceptor.app.on_create(&acceptor_session);

        let outbound = Arc::new(PumpStats::default());
        let inbound = Arc::new(PumpStats::default());

        let initiator_queue = initiator.registry.register_app(session.clone(), &initiator.app);
        let acceptor_queue =
            acceptor.registry.register_app(acceptor_session.clone(), &acceptor.app);

        let pumps = vec![
            self.spawn_pump(initiator_queue, acceptor, &session, outbound.clone()),
            self.spawn_pump(acceptor_queue, initiator, &acceptor_session, inbound.clone()),
        ];

        initiator.app.on_logon(&session);
        acceptor.app.on_logon(&acceptor_session);
        debug!(%session, "sim link established");

        SimLink {
            initiator: initiator.clone(),
            acceptor: acceptor.clone(),
            initiator_session: session,
            acceptor_session,
            outbound,
            inbound,
            pumps: Mutex::new(pumps),
        }
    }

    fn spawn_pump(
        &self,
        mut queue: OutboundQueue,
        to: &SimNode,
        session: &SessionId,
        stats: Arc<PumpStats>,
    ) -> JoinHandle<()> {
        let receiver = to.app.clone();
        let local = session.clone();
        let remote = session.counterpart();
        let dictionary = self.dictionary.clone();

        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut seq: u64 = 0;
            while let Some(mut message) = queue.recv().await {
                stamp_session_header(&mut message, &local);
                seq += 1;
                message.header_mut().set(tags::MSG_SEQ_NUM, seq.to_string());
                decoder.extend(message.to_wire().as_bytes());

                loop {
                    let frame = match decoder.decode() {
                        Ok(Some(frame)) => frame,
                        Ok(None) => break,
                        Err(err) => {
                            warn!(session = %local, %err, "framing error, buffer dropped");
                            decoder.buffer_mut().clear();
                            break;
                        },
                    };
                    if let Err(err) = verify_checksum(&frame) {
                        warn!(session = %local, %err, "frame dropped");
                        continue;
                    }
                    let delivered = match Message::from_wire(&frame, &dictionary) {
                        Ok(delivered) => delivered,
                        Err(err) => {
                            warn!(session = %local, %err, "unparseable frame dropped");
                            continue;
                        },
                    };

                    stats.delivered.fetch_add(1, Ordering::SeqCst);
                    if let Err(reject) = receiver.from_app(delivered, &remote) {
                        warn!(session = %remote, %reject, "message rejected");
                        stats.rejected.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            debug!(session = %local, "pump stopped");
        })
    }
}
