//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples scenario logic from system resources
//! (time, randomness). Expectation timeouts, logon waits, synthetic ID stamps
//! and generated order identifiers all go through it, so a simulation with a
//! paused clock and a seeded RNG replays a scenario exactly.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current monotonic time.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch.
    ///
    /// Only used to stamp identifiers (`ORD<millis>`, synthetic correlation
    /// prefixes), never for measuring elapsed time.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Every bounded wait in the scenario engine races against this future.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
