//! Deterministic environment.
//!
//! Time comes from tokio's clock, so `#[tokio::test(start_paused = true)]`
//! makes every timeout in the engine instantaneous and exact. Randomness comes
//! from a seeded ChaCha20 stream.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use fixsim_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall clock reported at creation: 2024-01-01T00:00:00Z.
pub const SIM_EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Seeded simulation environment.
///
/// Clones share the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    started: tokio::time::Instant,
}

impl SimEnv {
    /// Environment with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn wall_clock_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        SIM_EPOCH_MILLIS.saturating_add(elapsed)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
