//! Deterministic environment.
//!
//! Time comes from tokio's clock, so tests running with a paused clock
//! (`#[tokio::test(start_paused = true)]`) control it completely through
//! `tokio::time::advance`. Randomness comes from a seeded ChaCha stream.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tidings_core::Environment;
use tokio::time::Instant;

/// Wall clock at simulation start: 2024-05-01T10:00:00Z.
pub const SIM_EPOCH_MILLIS: i64 = 1_714_557_600_000;

/// Simulated environment with a seeded RNG and tokio time.
///
/// Clones share the RNG stream, so the sequence of values drawn across all
/// clones is a pure function of the seed.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    origin: Instant,
    epoch_millis: i64,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            origin: Instant::now(),
            epoch_millis: SIM_EPOCH_MILLIS,
        }
    }

    /// Start the wall clock at `epoch_millis` instead of [`SIM_EPOCH_MILLIS`].
    #[must_use]
    pub fn with_wall_clock(mut self, epoch_millis: i64) -> Self {
        self.epoch_millis = epoch_millis;
        self
    }

    /// Time elapsed since the environment was created.
    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.origin
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_millis.saturating_add(elapsed)
    }
}
