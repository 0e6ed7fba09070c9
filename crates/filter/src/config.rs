//! Filter configuration.

use dvgate_types::Round;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type RoundTimeoutFn = dyn Fn(Round) -> Duration + Send + Sync;

/// Temporal tunables and the schedule size bound.
///
/// # Example
///
/// ```
/// use dvgate_filter::FilterConfig;
/// use std::time::Duration;
///
/// let config = FilterConfig::default()
///     .with_decided_beat(Duration::from_secs(4))
///     .with_max_entries(50_000);
/// ```
#[derive(Clone)]
pub struct FilterConfig {
    /// Decided observations at a height before the beat throttle engages.
    ///
    /// Default: 2
    pub decided_count_threshold: u32,

    /// Minimum spacing between successive decided observations once the
    /// threshold is reached.
    ///
    /// Default: 2 seconds
    pub decided_beat: Duration,

    /// Hard ceiling on live (identifier, signer) entries in the schedule.
    /// Exceeding it evicts the least recently touched entries.
    ///
    /// Default: 200 000
    pub max_entries: usize,

    /// Timeout curve for QBFT rounds: how long a round must have lasted
    /// before a higher-round message from the same signer is timely.
    round_timeout: Arc<RoundTimeoutFn>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            decided_count_threshold: 2,
            decided_beat: Duration::from_secs(2),
            max_entries: 200_000,
            round_timeout: Arc::new(|_| Duration::from_secs(2)),
        }
    }
}

impl FilterConfig {
    pub fn with_decided_count_threshold(mut self, threshold: u32) -> Self {
        self.decided_count_threshold = threshold;
        self
    }

    pub fn with_decided_beat(mut self, beat: Duration) -> Self {
        self.decided_beat = beat;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Replace the round timeout curve. The default is a constant 2 seconds
    /// for every round.
    pub fn with_round_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Round) -> Duration + Send + Sync + 'static,
    {
        self.round_timeout = Arc::new(f);
        self
    }

    /// Timeout for the given round.
    pub fn round_timeout(&self, round: Round) -> Duration {
        (self.round_timeout)(round)
    }
}

impl fmt::Debug for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterConfig")
            .field("decided_count_threshold", &self.decided_count_threshold)
            .field("decided_beat", &self.decided_beat)
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.decided_count_threshold, 2);
        assert_eq!(config.decided_beat, Duration::from_secs(2));
        assert_eq!(config.max_entries, 200_000);
        assert_eq!(config.round_timeout(Round::FIRST), Duration::from_secs(2));
        assert_eq!(config.round_timeout(Round(40)), Duration::from_secs(2));
    }

    #[test]
    fn builder_methods() {
        let config = FilterConfig::default()
            .with_decided_count_threshold(3)
            .with_decided_beat(Duration::from_secs(12))
            .with_max_entries(1_000)
            .with_round_timeout(|round| Duration::from_secs(round.0));

        assert_eq!(config.decided_count_threshold, 3);
        assert_eq!(config.decided_beat, Duration::from_secs(12));
        assert_eq!(config.max_entries, 1_000);
        assert_eq!(config.round_timeout(Round(5)), Duration::from_secs(5));
    }
}
