//! # fixsim core
//!
//! Scenario engine and hub relay, independent of any transport.
//!
//! ## Architecture
//!
//! ```text
//! script ─► loader ─► Vec<Step> ─► ScenarioRunner ─► SessionLayer::send
//!                                        ▲
//!                                        │ ExpectationSlot
//!                                        │
//! session layer ─► RoleApp::from_app ────┘  (matcher, audit, auto reply)
//!
//! session layer ─► HubRelay::from_app ─► SessionLayer::send (other side)
//! ```
//!
//! Client and broker differ only in their [`Role`]; there is one runner and
//! one adapter. Time and randomness go through [`Environment`] so scenarios
//! replay deterministically under simulation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod audit;
pub mod env;
pub mod error;
pub mod expectation;
pub mod hub;
pub mod loader;
pub mod logon;
pub mod matcher;
pub mod role;
pub mod runner;
pub mod session;
pub mod step;

pub use adapter::RoleApp;
pub use audit::{AuditSink, TracingSink};
pub use env::Environment;
pub use error::{RelayError, ScenarioError};
pub use expectation::{ExpectationSlot, Offer};
pub use hub::{CorrelationTable, HubConfig, HubRelay, Side, SyntheticIdGenerator};
pub use loader::{load, parse_script};
pub use logon::{LogonLatch, LogonState};
pub use matcher::{BROKER_PROFILE, CLIENT_PROFILE, MatchProfile, correlation_suffix, matches};
pub use role::{BrokerRole, ClientRole, DEFAULT_SIM_ID, Perspective, Role};
pub use runner::{RunnerConfig, RunnerState, ScenarioReport, ScenarioRunner};
pub use session::{
    Application, DoNotSend, OutboundQueue, Reject, SendError, SessionId, SessionLayer,
    SessionRegistry, stamp_session_header,
};
pub use step::{Step, StepKind};
