//! Environment abstraction for deterministic testing.
//!
//! Decouples routing logic from system resources (time, randomness). Tests
//! pin the clocks and seed the RNG; production uses [`crate::SystemEnv`].

use std::time::Instant;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current monotonic time. Used to timestamp log actions.
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch. Used by `/date` and registration
    /// records.
    fn wall_clock_secs(&self) -> u64;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`, used for session ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
