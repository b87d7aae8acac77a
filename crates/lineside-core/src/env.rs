//! Environment abstraction for deterministic testing.
//!
//! Asset simulation needs three things from the outside world: a clock, a
//! way to wait, and randomness (intermittent track circuit failures). The
//! `Environment` trait provides all three so the same state machines run
//! under Tokio in production and under Turmoil's virtual clock in
//! simulation.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::Duration;

use tokio::time::Instant;

/// Abstract environment providing time, randomness, and async waiting.
///
/// `now()` returns a Tokio instant so that paused-clock tests and Turmoil
/// simulations observe the same virtual time as `sleep()`.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Simulation implementations must be seeded so a failing run can be
    /// replayed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Uniformly distributed duration in `[0, max)`.
    ///
    /// Millisecond resolution. A zero `max` yields zero.
    fn random_duration(&self, max: Duration) -> Duration {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.random_u64() % max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FixedEnv(u64);

    impl Environment for FixedEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let bytes = self.0.to_be_bytes();
            for (dst, src) in buffer.iter_mut().zip(bytes.iter().cycle()) {
                *dst = *src;
            }
        }
    }

    #[test]
    fn random_u64_reads_big_endian() {
        assert_eq!(FixedEnv(0x0102_0304_0506_0708).random_u64(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn random_duration_stays_below_max() {
        let env = FixedEnv(u64::MAX);
        let max = Duration::from_secs(10);
        assert_eq!(env.random_duration(max), Duration::from_millis(u64::MAX % 10_000));
        assert!(env.random_duration(max) < max);
    }

    #[test]
    fn random_duration_of_zero_is_zero() {
        assert_eq!(FixedEnv(7).random_duration(Duration::ZERO), Duration::ZERO);
    }
}
