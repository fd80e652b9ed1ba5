//! Deterministic simulation harness for fixsim.
//!
//! Client, broker and hub run against an in-memory session network instead
//! of TCP, with a seeded RNG and tokio's clock. Under
//! `#[tokio::test(start_paused = true)]` a 60 second expectation timeout
//! completes instantly and replays identically.
//!
//! # Example
//!
//! ```rust,ignore
//! let network = SimNetwork::new();
//! let client = SimNode::new(client_registry, client_app);
//! let hub = SimNode::new(hub_registry, hub_relay);
//! let link = network.connect(&client, &hub, SessionId::new("CLIENT", "HUB"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod recording;
mod sim_env;
mod sim_network;

pub use recording::{RecordingApp, RecordingSink};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv};
pub use sim_network::{PumpStats, SimLink, SimNetwork, SimNode};

/// Let spawned tasks run until they block.
///
/// Under a current-thread runtime this drains every pump and wakes every
/// runner that has something to do.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
