//! Adaptive back-off for cooperative dispatch loops (§5 CONCURRENCY & RESOURCE MODEL).
//!
//! Hub, cluster-manager, and data-proxy dispatch loops never block on a
//! single source of work; when a poll finds nothing, they sleep an
//! increasing amount, reset immediately once something arrives.

use std::time::Duration;

const INITIAL: Duration = Duration::from_millis(10);
const CEILING: Duration = Duration::from_secs(1);

/// Per-client idle counter: starts at ~10ms, doubles up to a 1s ceiling,
/// resets to zero on any received message.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveBackoff {
    current: Duration,
}

impl Default for AdaptiveBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveBackoff {
    pub fn new() -> Self {
        Self { current: INITIAL }
    }

    /// Sleep for the current back-off interval, then double it (capped).
    pub async fn idle(&mut self) {
        tokio::time::sleep(self.current).await;
        self.current = (self.current * 2).min(CEILING);
    }

    /// Reset to the initial interval after receiving a message.
    pub fn reset(&mut self) {
        self.current = INITIAL;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_the_initial_interval() {
        let b = AdaptiveBackoff::new();
        assert_eq!(b.current(), INITIAL);
    }

    #[tokio::test]
    async fn doubles_up_to_the_ceiling_and_resets() {
        let mut b = AdaptiveBackoff::new();
        let mut last = b.current();
        for _ in 0..20 {
            b.idle().await;
            assert!(b.current() >= last);
            assert!(b.current() <= CEILING);
            last = b.current();
        }
        assert_eq!(b.current(), CEILING);
        b.reset();
        assert_eq!(b.current(), INITIAL);
    }
}
