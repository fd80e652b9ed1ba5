//! Scenario and relay error types.

use std::{path::PathBuf, time::Duration};

use fixsim_proto::ParseError;
use thiserror::Error;

use crate::session::SendError;

/// Terminal failure of a scenario run.
///
/// A scenario is all-or-nothing: the first error aborts the run and is
/// reported together with the step it happened at.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Script file could not be read.
    #[error("cannot read script {}: {source}", path.display())]
    ScriptIo {
        /// Script path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A script line did not parse as a message.
    #[error("{}:{line}: {source}", path.display())]
    ScriptParse {
        /// Script path (or source name for in-memory scripts).
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Parser error.
        #[source]
        source: ParseError,
    },

    /// The session layer refused an OUTBOUND step.
    #[error("step {step} (line {line}): send failed: {reason}")]
    SendFailure {
        /// 0-based step index.
        step: usize,
        /// Script line.
        line: usize,
        /// Session layer error.
        #[source]
        reason: SendError,
    },

    /// No matching message arrived within the wait ceiling.
    #[error("step {step} (line {line}): no match for {expected} within {waited:?}")]
    ExpectationTimeout {
        /// 0-based step index.
        step: usize,
        /// Script line.
        line: usize,
        /// Template, pipe-delimited.
        expected: String,
        /// How long the runner waited.
        waited: Duration,
    },

    /// The completion signal was dropped before a match.
    #[error("step {step}: expectation cancelled")]
    ExpectationCancelled {
        /// 0-based step index.
        step: usize,
    },

    /// The session did not log on in time.
    #[error("session not logged on within {waited:?}")]
    LogonTimeout {
        /// How long the runner waited.
        waited: Duration,
    },
}

impl ScenarioError {
    /// Process exit code for this failure.
    ///
    /// Script errors are configuration problems (2); everything that happens
    /// once the scenario is running is a scenario failure (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ScriptIo { .. } | Self::ScriptParse { .. } => 2,
            Self::SendFailure { .. }
            | Self::ExpectationTimeout { .. }
            | Self::ExpectationCancelled { .. }
            | Self::LogonTimeout { .. } => 1,
        }
    }

    /// Step index the failure is attributed to, if any.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::SendFailure { step, .. }
            | Self::ExpectationTimeout { step, .. }
            | Self::ExpectationCancelled { step } => Some(*step),
            Self::ScriptIo { .. } | Self::ScriptParse { .. } | Self::LogonTimeout { .. } => None,
        }
    }
}

/// Why the hub dropped a message. Logged, never propagated.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Message came from a session the hub does not bridge.
    #[error("message from unknown session {0}")]
    UnknownSession(String),

    /// Destination session is not logged on.
    #[error("target {0} not logged on")]
    TargetOffline(String),

    /// Re-serialized copy failed to parse.
    #[error("re-parse failed: {0}")]
    Reparse(#[from] ParseError),

    /// Session layer refused the forward.
    #[error("forward failed: {0}")]
    Send(#[from] SendError),
}
