//! fixsim processes.
//!
//! This crate runs the scenario engine and the hub relay over real sockets:
//! - Tokio TCP with a minimal session layer
//! - System time and OS randomness
//! - A file audit trail fed through a channel
//!
//! ## Architecture
//!
//! ```text
//! fixsim client ──TCP──► fixsim hub ──TCP──► fixsim broker
//!  (initiator)         (acceptor + initiator)   (acceptor)
//!
//! each process
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ SessionTransport   (logon, framing, heartbeats)
//!   ├─ SessionRegistry    (outbound queues)
//!   ├─ RoleApp/HubRelay   (Application)
//!   └─ ChannelSink        (audit lines to FileAuditSink)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod config;
mod error;
mod system_env;
mod transport;

use std::{net::SocketAddr, sync::Arc};

pub use audit::{
    AuditConsumer, ChannelSink, DEFAULT_AUDIT_FILE, FileAuditSink, RUN_GAP, audit_channel,
};
pub use config::{
    BROKER_LOGON_TIMEOUT, BrokerConfig, ClientConfig, DEFAULT_BROKER_ADDR, DEFAULT_HUB_ADDR,
    DEFAULT_HUB_COMP_ID, HubServerConfig,
};
pub use error::ServerError;
use fixsim_core::{
    AuditSink, BrokerRole, ClientRole, HubRelay, RoleApp, ScenarioReport, SessionRegistry, Step,
};
pub use system_env::SystemEnv;
use tokio::{net::TcpListener, task::JoinHandle};
pub use transport::{SessionHandle, SessionTransport, TransportConfig};

/// Run a client scenario against the hub at `config.connect`.
///
/// The script is loaded before connecting, so a bad script never touches
/// the network.
pub async fn run_client(
    config: ClientConfig,
    audit: Arc<dyn AuditSink>,
) -> Result<ScenarioReport, ServerError> {
    config.validate()?;
    let role = ClientRole::new(&config.sim_id);
    let steps = fixsim_core::load(&config.script, &role, Some(&config.session))?;

    let registry = Arc::new(SessionRegistry::new());
    let app = Arc::new(RoleApp::new(role, SystemEnv::new(), registry.clone(), audit));
    let transport = SessionTransport::new(app.clone(), registry, config.transport);

    let handle = transport.initiate(&config.connect, config.session.clone()).await?;
    let mut runner = app.runner(config.session).with_config(config.runner);
    runner.await_logon().await?;

    let result = runner.run(&steps).await;
    handle.logout("scenario finished").await;
    result.map_err(ServerError::from)
}

/// Broker process bound to its listen address.
pub struct Broker {
    config: BrokerConfig,
    app: Arc<RoleApp<BrokerRole, SystemEnv>>,
    transport: Arc<SessionTransport>,
    listener: TcpListener,
    steps: Option<Vec<Step>>,
}

impl Broker {
    /// Load the script (if any) and bind.
    pub async fn bind(config: BrokerConfig, audit: Arc<dyn AuditSink>) -> Result<Self, ServerError> {
        config.validate()?;
        let role = BrokerRole::new().with_auto_ack(config.auto_ack);
        let steps = config
            .script
            .as_deref()
            .map(|script| fixsim_core::load(script, &role, Some(&config.session)))
            .transpose()?;

        let registry = Arc::new(SessionRegistry::new());
        let app = Arc::new(RoleApp::new(role, SystemEnv::new(), registry.clone(), audit));
        let transport =
            Arc::new(SessionTransport::new(app.clone(), registry, config.transport.clone()));
        let listener = SessionTransport::bind(&config.listen).await?;

        Ok(Self { config, app, transport, listener, steps })
    }

    /// Get the local address the broker is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the hub and play the script.
    ///
    /// Without a script the broker serves until Ctrl-C and returns `None`.
    pub async fn run(self) -> Result<Option<ScenarioReport>, ServerError> {
        let Self { config, app, transport, listener, steps } = self;
        let server = AbortOnDrop(tokio::spawn(
            transport.serve(listener, config.session.sender_comp_id().to_string()),
        ));

        let Some(steps) = steps else {
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down");
            drop(server);
            return Ok(None);
        };

        let waiting = app.runner(config.session.clone()).with_config(config.runner.clone());
        let session = waiting.await_logon().await?;
        let mut runner = app.runner(session).with_config(config.runner);
        let report = runner.run(&steps).await?;
        drop(server);
        Ok(Some(report))
    }
}

/// Hub process bound to its client-facing address.
pub struct Hub {
    config: HubServerConfig,
    relay: Arc<HubRelay>,
    transport: Arc<SessionTransport>,
    listener: TcpListener,
}

impl Hub {
    /// Bind the client-facing listener.
    pub async fn bind(config: HubServerConfig, audit: Arc<dyn AuditSink>) -> Result<Self, ServerError> {
        config.validate()?;
        let registry = Arc::new(SessionRegistry::new());
        let relay =
            Arc::new(HubRelay::new(config.relay.clone(), &SystemEnv::new(), registry.clone(), audit));
        let transport =
            Arc::new(SessionTransport::new(relay.clone(), registry, config.transport.clone()));
        let listener = SessionTransport::bind(&config.listen).await?;

        Ok(Self { config, relay, transport, listener })
    }

    /// Get the local address the hub accepts clients on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// The relay.
    pub fn relay(&self) -> &Arc<HubRelay> {
        &self.relay
    }

    /// Relay until Ctrl-C, reconnecting to the broker whenever it drops.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self { config, transport, listener, .. } = self;
        let _server =
            AbortOnDrop(tokio::spawn(Arc::clone(&transport).serve(listener, config.comp_id.clone())));

        let broker_session = config.broker_session();
        let _broker_link = AbortOnDrop(tokio::spawn(async move {
            loop {
                let handle =
                    transport.initiate_with_retry(&config.broker_connect, broker_session.clone()).await;
                handle.closed().await;
                tracing::warn!(session = %broker_session, "broker session lost, reconnecting");
            }
        }));

        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");
        Ok(())
    }
}

/// Aborts a background task when it goes out of scope.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
