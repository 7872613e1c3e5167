//! # Fibonacci Backoff
//!
//! Progressive backoff for reconciliation retries. Grows more slowly than
//! exponential backoff, which suits operations that routinely need several
//! retries without hammering the API server.
//!
//! The sequence is calculated in minutes and capped: 1m, 1m, 2m, 3m, 5m,
//! 8m, 10m (max), then converted to seconds for the requeue directive.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// # Example
///
/// ```
/// use trust_stack_operator::runtime::backoff::FibonacciBackoff;
///
/// let mut backoff = FibonacciBackoff::new(1, 10);
/// assert_eq!(backoff.next_backoff_seconds(), 60);  // 1m
/// assert_eq!(backoff.next_backoff_seconds(), 60);  // 1m
/// assert_eq!(backoff.next_backoff_seconds(), 120); // 2m
/// ```
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// New backoff bounded by `min_minutes` and `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Current backoff in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result_seconds = self.current_minutes * 60;
        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);
        result_seconds
    }

    /// Current backoff as a [`Duration`]; advances the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence after a successful reconciliation
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_follows_fibonacci_in_minutes() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 120);
        assert_eq!(backoff.next_backoff_seconds(), 180);
        assert_eq!(backoff.next_backoff_seconds(), 300);
        assert_eq!(backoff.next_backoff_seconds(), 480);
        assert_eq!(backoff.next_backoff_seconds(), 600);
    }

    #[test]
    fn test_sequence_caps_at_max() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        for _ in 0..7 {
            backoff.next_backoff_seconds();
        }
        assert_eq!(backoff.next_backoff_seconds(), 600);
        assert_eq!(backoff.next_backoff_seconds(), 600);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 120);
    }

    #[test]
    fn test_as_duration() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
    }
}
