//! Process configuration for the three roles.

use std::{path::PathBuf, time::Duration};

use fixsim_core::{DEFAULT_SIM_ID, HubConfig, RunnerConfig, SessionId};

use crate::{error::ServerError, transport::TransportConfig};

/// Default hub listen address.
pub const DEFAULT_HUB_ADDR: &str = "127.0.0.1:9876";

/// Default broker listen address.
pub const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:9877";

/// Default hub comp ID.
pub const DEFAULT_HUB_COMP_ID: &str = "HUB";

/// How long a broker waits for its counterparty to log on.
pub const BROKER_LOGON_TIMEOUT: Duration = Duration::from_secs(120);

/// Client process configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hub address to connect to
    pub connect: String,
    /// Local session: our comp ID and the hub's
    pub session: SessionId,
    /// Prefix for ClOrdID rewriting
    pub sim_id: String,
    /// Scenario script
    pub script: PathBuf,
    /// Runner timeouts
    pub runner: RunnerConfig,
    /// Session transport tuning
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect: DEFAULT_HUB_ADDR.to_string(),
            session: SessionId::new("CLIENT", DEFAULT_HUB_COMP_ID),
            sim_id: DEFAULT_SIM_ID.to_string(),
            script: PathBuf::from("scenarios/client.fix"),
            runner: RunnerConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ServerError> {
        validate_session(&self.session)?;
        if self.sim_id.is_empty() || self.sim_id.contains('-') {
            return Err(ServerError::Config(format!(
                "sim id must be non-empty and free of '-': {:?}",
                self.sim_id
            )));
        }
        Ok(())
    }
}

/// Broker process configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address to accept the hub on
    pub listen: String,
    /// Local session: our comp ID and the expected counterparty's
    pub session: SessionId,
    /// Scenario script; without one the broker only serves
    pub script: Option<PathBuf>,
    /// Answer every order with an acknowledgement
    pub auto_ack: bool,
    /// Runner timeouts
    pub runner: RunnerConfig,
    /// Session transport tuning
    pub transport: TransportConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_BROKER_ADDR.to_string(),
            session: SessionId::new("BROKER", DEFAULT_HUB_COMP_ID),
            script: None,
            auto_ack: false,
            runner: RunnerConfig { logon_timeout: BROKER_LOGON_TIMEOUT, ..RunnerConfig::default() },
            transport: TransportConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ServerError> {
        validate_session(&self.session)?;
        if self.script.is_none() && !self.auto_ack {
            tracing::warn!("broker has neither a script nor auto-ack, it will only log");
        }
        Ok(())
    }
}

/// Hub process configuration.
#[derive(Debug, Clone)]
pub struct HubServerConfig {
    /// Address to accept the client on
    pub listen: String,
    /// Broker address to connect to
    pub broker_connect: String,
    /// The hub's own comp ID on both sessions
    pub comp_id: String,
    /// Counterparty comp IDs
    pub relay: HubConfig,
    /// Session transport tuning
    pub transport: TransportConfig,
}

impl Default for HubServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_HUB_ADDR.to_string(),
            broker_connect: DEFAULT_BROKER_ADDR.to_string(),
            comp_id: DEFAULT_HUB_COMP_ID.to_string(),
            relay: HubConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl HubServerConfig {
    /// Session the hub initiates towards the broker.
    pub fn broker_session(&self) -> SessionId {
        SessionId::new(&self.comp_id, &self.relay.broker_comp_id)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ServerError> {
        let HubConfig { client_comp_id, broker_comp_id } = &self.relay;
        if client_comp_id == broker_comp_id {
            return Err(ServerError::Config(format!(
                "client and broker share comp ID {client_comp_id}"
            )));
        }
        validate_session(&SessionId::new(&self.comp_id, client_comp_id))?;
        validate_session(&self.broker_session())
    }
}

fn validate_session(session: &SessionId) -> Result<(), ServerError> {
    if session.sender_comp_id().is_empty() || session.target_comp_id().is_empty() {
        return Err(ServerError::Config(format!("empty comp ID in session {session}")));
    }
    if session.sender_comp_id() == session.target_comp_id() {
        return Err(ServerError::Config(format!("session {session} talks to itself")));
    }
    Ok(())
}
