//! Production environment: wall clock, Tokio timers and OS randomness.

use std::time::Duration;

use lineside_core::Environment;
use tokio::time::Instant;

/// Production environment.
///
/// Randomness only drives simulated failure timing, but comes from
/// `getrandom` so that no two modules flicker in lockstep.
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
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Only failure timing depends on this; a fixed pattern is acceptable.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_fill_the_buffer() {
        let env = SystemEnv::new();
        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        env.random_bytes(&mut first);
        env.random_bytes(&mut second);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn sleep_waits() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        assert!(env.now() - start >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn failure_intervals_stay_in_range() {
        let env = SystemEnv::new();
        for _ in 0..100 {
            assert!(env.random_duration(Duration::from_secs(10)) < Duration::from_secs(10));
        }
    }
}
