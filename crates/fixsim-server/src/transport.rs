//! Minimal TCP session transport.
//!
//! Just enough session layer to run the roles against each other: a Logon
//! handshake, MsgSeqNum and SendingTime stamping, heartbeats, TestRequest
//! replies and Logout. No resend, no message store, no sequence checks.
//!
//! Each established session gets a reader and a writer task:
//!
//! ```text
//! send: to_app ─► SessionRegistry queue ─► writer: stamp 8/49/56/34/52 ─► socket
//! socket ─► reader: frame ─► checksum ─► parse ─► admin handling | from_app
//! ```

use std::{sync::Arc, time::Duration};

use fixsim_core::{Application, OutboundQueue, SessionId, SessionRegistry, stamp_session_header};
use fixsim_proto::{Dictionary, FrameDecoder, Message, MsgType, tags, verify_checksum};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::error::ServerError;

/// Session transport tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// HeartBtInt announced in Logon and used for outgoing heartbeats
    pub heartbeat_interval: Duration,
    /// How long to wait for the counterparty's Logon
    pub logon_timeout: Duration,
    /// Largest accepted frame
    pub max_frame_size: usize,
    /// Pause between initiator connection attempts
    pub reconnect_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            logon_timeout: Duration::from_secs(10),
            max_frame_size: fixsim_proto::DEFAULT_MAX_FRAME_SIZE,
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

/// Live session owned by the transport.
pub struct SessionHandle {
    session: SessionId,
    admin: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Local view of the session.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Whether the session task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end on its own.
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            error!(session = %self.session, "session task failed: {}", e);
        }
    }

    /// Send Logout and wait (bounded) for the counterparty to close.
    pub async fn logout(self, reason: &str) {
        let mut logout = Message::new(MsgType::Logout);
        logout.set(tags::TEXT, reason);
        if self.admin.send(logout).is_err() {
            return;
        }
        if tokio::time::timeout(Duration::from_secs(2), self.task).await.is_err() {
            warn!(session = %self.session, "no logout reply, closing");
        }
    }
}

/// Connects an [`Application`] and a [`SessionRegistry`] to TCP sessions.
pub struct SessionTransport {
    app: Arc<dyn Application>,
    registry: Arc<SessionRegistry>,
    config: TransportConfig,
    dictionary: Dictionary,
}

impl SessionTransport {
    /// Transport delivering to `app` and draining `registry` queues.
    pub fn new(
        app: Arc<dyn Application>,
        registry: Arc<SessionRegistry>,
        config: TransportConfig,
    ) -> Self {
        Self { app, registry, config, dictionary: Dictionary::default() }
    }

    /// Connect to `addr` and log on as `session`.
    pub async fn initiate(
        &self,
        addr: &str,
        session: SessionId,
    ) -> Result<SessionHandle, ServerError> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(%session, addr, "connected");
        self.app.on_create(&session);

        let mut logon = self.logon_message();
        stamp(&mut logon, &session, 1);
        stream.write_all(logon.to_wire().as_bytes()).await?;

        let mut decoder = FrameDecoder::with_max_frame_size(self.config.max_frame_size);
        let reply = self.read_logon(&mut stream, &mut decoder).await?;
        if reply.sender_comp_id() != Some(session.target_comp_id()) {
            return Err(ServerError::Logon(format!(
                "expected logon from {}, got {:?}",
                session.target_comp_id(),
                reply.sender_comp_id()
            )));
        }

        Ok(self.establish(stream, decoder, session, 2))
    }

    /// Like [`initiate`](Self::initiate), retrying until a logon succeeds.
    pub async fn initiate_with_retry(&self, addr: &str, session: SessionId) -> SessionHandle {
        loop {
            match self.initiate(addr, session.clone()).await {
                Ok(handle) => return handle,
                Err(e) => {
                    warn!(%session, addr, "connect failed: {}", e);
                    tokio::time::sleep(self.config.reconnect_interval).await;
                },
            }
        }
    }

    /// Bind a listener.
    pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept sessions addressed to `local_comp_id` forever.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, local_comp_id: String) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let transport = Arc::clone(&self);
                    let local_comp_id = local_comp_id.clone();
                    tokio::spawn(async move {
                        match transport.accept(stream, &local_comp_id).await {
                            Ok(handle) => handle.closed().await,
                            Err(e) => warn!(%peer, "logon rejected: {}", e),
                        }
                    });
                },
                Err(e) => {
                    error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Run the acceptor side of the Logon handshake on `stream`.
    pub async fn accept(
        &self,
        mut stream: TcpStream,
        local_comp_id: &str,
    ) -> Result<SessionHandle, ServerError> {
        stream.set_nodelay(true)?;
        let mut decoder = FrameDecoder::with_max_frame_size(self.config.max_frame_size);
        let logon = self.read_logon(&mut stream, &mut decoder).await?;

        let (Some(remote), Some(target)) = (logon.sender_comp_id(), logon.target_comp_id()) else {
            return Err(ServerError::Logon("logon without SenderCompID/TargetCompID".to_string()));
        };
        if target != local_comp_id {
            let mut logout = Message::new(MsgType::Logout);
            logout.set(tags::TEXT, format!("unknown TargetCompID {target}"));
            stamp(&mut logout, &SessionId::new(local_comp_id, remote), 1);
            stream.write_all(logout.to_wire().as_bytes()).await?;
            return Err(ServerError::Logon(format!("unknown TargetCompID {target}")));
        }

        let session = SessionId::new(local_comp_id, remote);
        self.app.on_create(&session);

        let mut reply = self.logon_message();
        stamp(&mut reply, &session, 1);
        stream.write_all(reply.to_wire().as_bytes()).await?;
        info!(%session, "accepted");

        Ok(self.establish(stream, decoder, session, 2))
    }

    fn logon_message(&self) -> Message {
        let mut logon = Message::new(MsgType::Logon);
        logon.set(tags::ENCRYPT_METHOD, "0");
        logon.set(tags::HEART_BT_INT, self.config.heartbeat_interval.as_secs().to_string());
        logon
    }

    async fn read_logon(
        &self,
        stream: &mut TcpStream,
        decoder: &mut FrameDecoder,
    ) -> Result<Message, ServerError> {
        let waited = self.config.logon_timeout;
        let message = tokio::time::timeout(waited, read_message(stream, decoder, &self.dictionary))
            .await
            .map_err(|_| ServerError::LogonTimeout(waited))??
            .ok_or_else(|| ServerError::Logon("connection closed during logon".to_string()))?;

        match message.msg_type() {
            Some(MsgType::Logon) => Ok(message),
            Some(MsgType::Logout) => Err(ServerError::Logon(
                message.get(tags::TEXT).unwrap_or("logout during logon").to_string(),
            )),
            _ => Err(ServerError::Logon(format!("expected Logon, got {}", message.pretty()))),
        }
    }

    /// Register the session, fire `on_logon` and start its tasks.
    fn establish(
        &self,
        stream: TcpStream,
        decoder: FrameDecoder,
        session: SessionId,
        next_seq: u64,
    ) -> SessionHandle {
        let (reader, writer) = stream.into_split();
        let queue = self.registry.register_app(session.clone(), &self.app);
        let generation = queue.generation();
        let (admin_tx, admin_rx) = mpsc::unbounded_channel();

        self.app.on_logon(&session);

        let writer_task = tokio::spawn(write_loop(
            writer,
            queue,
            admin_rx,
            session.clone(),
            next_seq,
            self.config.heartbeat_interval,
        ));

        let app = Arc::clone(&self.app);
        let registry = Arc::clone(&self.registry);
        let dictionary = self.dictionary.clone();
        let reader_session = session.clone();
        let reader_admin = admin_tx.clone();
        let task = tokio::spawn(async move {
            let result =
                read_loop(reader, decoder, &dictionary, app.as_ref(), &reader_session, &reader_admin)
                    .await;

            drop(reader_admin);
            // A reconnect with the same CompIDs may already own the entry.
            if registry.unregister_generation(&reader_session, generation) {
                app.on_logout(&reader_session);
            } else {
                debug!(session = %reader_session, "session superseded by a newer connection");
            }

            match result {
                // Writer ends after flushing the Logout reply.
                Ok(Closed::Logout) => {
                    if let Err(e) = writer_task.await {
                        error!(session = %reader_session, "writer task failed: {}", e);
                    }
                },
                Ok(Closed::Eof) => writer_task.abort(),
                Err(e) => {
                    warn!(session = %reader_session, "session ended: {}", e);
                    writer_task.abort();
                },
            }
            info!(session = %reader_session, "session closed");
        });

        SessionHandle { session, admin: admin_tx, task }
    }
}

/// How a session's reader ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    Logout,
    Eof,
}

/// Set identity, MsgSeqNum and SendingTime.
fn stamp(message: &mut Message, session: &SessionId, seq: u64) {
    stamp_session_header(message, session);
    let header = message.header_mut();
    header.set(tags::MSG_SEQ_NUM, seq.to_string());
    header.set(tags::SENDING_TIME, chrono::Utc::now().format("%Y%m%d-%H:%M:%S%.3f").to_string());
}

/// Read the next message, `None` on a clean EOF.
async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
    decoder: &mut FrameDecoder,
    dictionary: &Dictionary,
) -> Result<Option<Message>, ServerError> {
    loop {
        if let Some(frame) = decoder.decode()? {
            verify_checksum(&frame)?;
            return Ok(Some(Message::from_wire(&frame, dictionary)?));
        }
        if reader.read_buf(decoder.buffer_mut()).await? == 0 {
            return Ok(None);
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    mut decoder: FrameDecoder,
    dictionary: &Dictionary,
    app: &dyn Application,
    session: &SessionId,
    admin: &mpsc::UnboundedSender<Message>,
) -> Result<Closed, ServerError> {
    while let Some(message) = read_message(&mut reader, &mut decoder, dictionary).await? {
        debug!(%session, message = %message.pretty(), "received");

        match message.msg_type() {
            Some(MsgType::Heartbeat | MsgType::SequenceReset | MsgType::Logon) => {},
            Some(MsgType::TestRequest) => {
                let mut heartbeat = Message::new(MsgType::Heartbeat);
                if let Some(id) = message.get(tags::TEST_REQ_ID) {
                    heartbeat.set(tags::TEST_REQ_ID, id);
                }
                let _ = admin.send(heartbeat);
            },
            Some(MsgType::ResendRequest) => {
                warn!(%session, "ResendRequest ignored, no message store");
            },
            Some(MsgType::Reject) => {
                warn!(%session, text = message.get(tags::TEXT).unwrap_or_default(), "session reject");
            },
            Some(MsgType::Logout) => {
                info!(%session, text = message.get(tags::TEXT).unwrap_or_default(), "logout received");
                let _ = admin.send(Message::new(MsgType::Logout));
                return Ok(Closed::Logout);
            },
            _ => {
                let seq = message.header().get(tags::MSG_SEQ_NUM).unwrap_or("0").to_string();
                if let Err(reject) = app.from_app(message, session) {
                    warn!(%session, %reject, "application reject");
                    let mut msg = Message::new(MsgType::Reject);
                    msg.set(tags::REF_SEQ_NUM, seq);
                    msg.set(tags::TEXT, reject.reason);
                    if let Some(tag) = reject.ref_tag {
                        msg.set(tags::REF_TAG_ID, tag.to_string());
                    }
                    let _ = admin.send(msg);
                }
            },
        }
    }
    Ok(Closed::Eof)
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut queue: OutboundQueue,
    mut admin: mpsc::UnboundedReceiver<Message>,
    session: SessionId,
    mut seq: u64,
    heartbeat_interval: Duration,
) {
    let start = tokio::time::Instant::now() + heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(start, heartbeat_interval);

    loop {
        let mut message = tokio::select! {
            biased;
            Some(message) = admin.recv() => message,
            Some(message) = queue.recv() => message,
            _ = heartbeat.tick() => Message::new(MsgType::Heartbeat),
            else => break,
        };

        let is_logout = message.msg_type() == Some(MsgType::Logout);
        stamp(&mut message, &session, seq);
        seq += 1;

        debug!(%session, message = %message.pretty(), "sending");
        if let Err(e) = writer.write_all(message.to_wire().as_bytes()).await {
            warn!(%session, "write failed: {}", e);
            break;
        }
        if is_logout {
            let _ = writer.shutdown().await;
            break;
        }
    }
}
