use std::time::Duration;

use cosmic_protocol::{TRANSPORT_CLOSE_REASON, TRANSPORT_ERROR_REASON};

pub const DEFAULT_BASE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Bounded exponential reconnect schedule.
///
/// `delay = min(base * 1.5^attempts, max_delay)` where `attempts` counts the
/// retries already made since the last successful connect. Transport-level
/// failures skip the table and retry after `transport_retry`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_interval: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub transport_retry: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(DEFAULT_BASE_INTERVAL_MS),
            multiplier: BACKOFF_MULTIPLIER,
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            transport_retry: Duration::from_millis(1_000),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let base_ms = self.base_interval.as_millis() as f64;
        let exp = attempts.min(i32::MAX as u32) as i32;
        let delay_ms = base_ms * self.multiplier.powi(exp);
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Disconnects caused by the transport itself are retried immediately.
    pub fn is_transport_failure(reason: &str) -> bool {
        reason == TRANSPORT_ERROR_REASON || reason == TRANSPORT_CLOSE_REASON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_by_half_each_attempt() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(1), Duration::from_millis(1_500));
        assert_eq!(p.delay_for(2), Duration::from_millis(2_250));
        assert_eq!(p.delay_for(3), Duration::from_millis(3_375));
    }

    #[test]
    fn delay_is_capped() {
        let p = ReconnectPolicy::default();
        // 1000 * 1.5^9 ≈ 38443 ms
        assert_eq!(p.delay_for(9), Duration::from_millis(30_000));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn exhaustion_at_max_attempts() {
        let p = ReconnectPolicy::default();
        assert!(!p.is_exhausted(9));
        assert!(p.is_exhausted(10));
        assert!(p.is_exhausted(11));
    }

    #[test]
    fn transport_reasons() {
        assert!(ReconnectPolicy::is_transport_failure("transport error"));
        assert!(ReconnectPolicy::is_transport_failure("transport close"));
        assert!(!ReconnectPolicy::is_transport_failure("io server disconnect"));
        assert!(!ReconnectPolicy::is_transport_failure("io client disconnect"));
    }
}
