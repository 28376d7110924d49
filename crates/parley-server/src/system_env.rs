//! Production environment using system time and the OS RNG.

use std::time::Instant;

use crate::env::Environment;

/// Production environment.
///
/// Session ids come from getrandom, so they are not guessable by peers.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without entropy the server cannot hand out
/// unpredictable session ids and must not keep running.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
