//! Production environment.
//!
//! Real monotonic time, the system wall clock for message timestamps, OS
//! entropy for message ID suffixes and tokio timers for backoff.

use std::time::Duration;

use tidings_core::Environment;

/// Production environment using system time and OS randomness.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. That indicates a broken host
/// and there is nothing useful to fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG is available");
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> i64 {
        // A clock set before 1970 yields 0 rather than a negative timestamp
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }
}
