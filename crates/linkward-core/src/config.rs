// ── Engine runtime configuration ──
//
// Describes how the action engine runs: worker count, retry policy and
// deadlines. The config crate builds it from files and environment; core
// never reads config files.

use std::time::Duration;

/// Tuning for [`ActionEngine`](crate::engine::ActionEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Concurrent workers. Actions on one port still run one at a time.
    pub workers: usize,
    /// Attempts per action, counting the first. Only transport-level
    /// failures are retried.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff: Duration,
    /// Deadline for one attempt against the switch. Expiry counts as a
    /// transport failure.
    pub action_timeout: Duration,
    /// How often idle workers re-check the queue without a wakeup.
    pub poll_interval: Duration,
}

impl EngineConfig {
    /// Delay before retry number `attempt` (the first retry is 1).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            backoff: Duration::from_millis(250),
            action_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let config = EngineConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(250));
        assert_eq!(config.backoff_for(2), Duration::from_millis(500));
        assert_eq!(config.backoff_for(3), Duration::from_millis(1000));
    }
}
