//! Server error types.

use std::{fmt, time::Duration};

use fixsim_core::ScenarioError;
use fixsim_proto::{FrameError, ParseError};

/// Errors that can occur in a fixsim process.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error
    Config(String),

    /// Transport/network error
    Transport(String),

    /// Framing or parse error on the wire
    Protocol(String),

    /// Counterparty refused or botched the logon
    Logon(String),

    /// No logon reply within the deadline
    LogonTimeout(Duration),

    /// Scenario failed
    Scenario(ScenarioError),
}

impl ServerError {
    /// Process exit code: 1 for a failed scenario, 2 for anything that
    /// stopped the scenario from starting.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Scenario(err) => err.exit_code(),
            Self::Config(_)
            | Self::Transport(_)
            | Self::Protocol(_)
            | Self::Logon(_)
            | Self::LogonTimeout(_) => 2,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Logon(msg) => write!(f, "logon failed: {msg}"),
            Self::LogonTimeout(waited) => write!(f, "no logon reply within {waited:?}"),
            Self::Scenario(err) => write!(f, "scenario failed: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Scenario(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScenarioError> for ServerError {
    fn from(err: ScenarioError) -> Self {
        Self::Scenario(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<FrameError> for ServerError {
    fn from(err: FrameError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<ParseError> for ServerError {
    fn from(err: ParseError) -> Self {
        Self::Protocol(err.to_string())
    }
}
