//! Global spacing between network fetch attempts.
//!
//! Every domain shares one gate, so refresh opportunities that land within
//! the spacing window of each other collapse into a single request.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::nanos::Nanos;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};

/// Governor clock that reads `tokio::time::Instant`, so a paused test
/// runtime drives the gate along with everything else.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    type Instant = Nanos;

    fn now(&self) -> Nanos {
        Nanos::from(self.origin.elapsed())
    }
}

type SpacingLimiter = GovLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Nanos>>;

/// One attempt per `min_spacing`, no burst. Zero spacing never blocks.
#[derive(Debug)]
pub struct RequestGate {
    min_spacing: Duration,
    limiter: Option<SpacingLimiter>,
}

impl RequestGate {
    pub fn new(min_spacing: Duration) -> Self {
        let limiter = Quota::with_period(min_spacing)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| GovLimiter::direct_with_clock(quota, &TokioClock::new()));
        Self { min_spacing, limiter }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Take the next attempt slot if the spacing window has passed.
    /// Call immediately before the network request; a taken slot counts
    /// whether the request then succeeds or not.
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_gate_opens_after_spacing() {
        let gate = RequestGate::new(Duration::from_secs(1));
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!gate.try_acquire());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gate_does_not_bank_attempts() {
        let gate = RequestGate::new(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_spacing_never_blocks() {
        let gate = RequestGate::new(Duration::ZERO);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert_eq!(gate.min_spacing(), Duration::ZERO);
    }
}
