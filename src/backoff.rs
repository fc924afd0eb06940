//! # Bounded Exponential Backoff with Jitter
//!
//! Pure policy, no I/O: [`Backoff`] hands out successive delays to a retry
//! loop and tells the caller when the configured budget is spent. It mirrors
//! the source's `ExpBackoff`, with the jitter draw and retry-count bookkeeping
//! made explicit rather than folded into a single "-1 means stop" sentinel.
//!
//! ## Lifetime
//!
//! A `Backoff` is per-call local state, never shared across ranks or
//! cloned across retry loops — `crate::transport::retrying::RetryingTransport`
//! constructs a fresh one at the top of every `send`/`recv`.

use std::time::Duration;

use rand::Rng;

/// The result of asking a [`Backoff`] for its next delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffOutcome {
    /// Sleep (or poll-with-timeout) for this long before retrying.
    Delay(Duration),
    /// The configured retry budget has been spent; give up.
    Exhausted,
}

/// Bounded exponential backoff with additive uniform jitter.
///
/// `next()` returns `backoff_amt * 2^k + j` seconds, where `k` is the
/// 1-based attempt number and `j` is drawn uniformly from `[0, 1)` once per
/// call, until `retries` attempts have been handed out, after which it
/// returns [`BackoffOutcome::Exhausted`] forever (until [`Backoff::reset`]).
#[derive(Debug, Clone)]
pub struct Backoff {
    retries: u32,
    backoff_amt: f64,
    retry_count: u32,
}

impl Backoff {
    /// Construct a backoff policy with the given retry budget and base
    /// delay (in seconds).
    pub fn new(retries: u32, backoff_amt: f64) -> Self {
        Self {
            retries,
            backoff_amt,
            retry_count: 0,
        }
    }

    /// Ask for the next delay, consuming one unit of the retry budget.
    pub fn next(&mut self) -> BackoffOutcome {
        if self.retry_count == self.retries {
            return BackoffOutcome::Exhausted;
        }
        self.retry_count += 1;

        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let delay_s = self.backoff_amt * 2f64.powi(self.retry_count as i32) + jitter;
        BackoffOutcome::Delay(Duration::from_secs_f64(delay_s))
    }

    /// Reset the retry counter to zero, as if no attempts had been made.
    pub fn reset(&mut self) {
        self.retry_count = 0;
    }

    /// The number of attempts handed out so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_at_least_the_base_amount() {
        let mut b = Backoff::new(5, 0.01);
        match b.next() {
            BackoffOutcome::Delay(d) => {
                // k=1: 0.01 * 2^1 = 0.02, plus jitter in [0, 1)
                assert!(d.as_secs_f64() >= 0.02);
                assert!(d.as_secs_f64() < 1.02);
            }
            BackoffOutcome::Exhausted => panic!("should not be exhausted on first call"),
        }
    }

    #[test]
    fn delays_grow_exponentially_in_their_base_term() {
        let mut b = Backoff::new(10, 0.01);
        let first = match b.next() {
            BackoffOutcome::Delay(d) => d,
            _ => panic!("unexpected exhaustion"),
        };
        let second = match b.next() {
            BackoffOutcome::Delay(d) => d,
            _ => panic!("unexpected exhaustion"),
        };
        // Jitter can narrow the gap, but the base term doubles each call
        // (0.02 -> 0.04), so even worst-case jitter (0 vs just under 1)
        // cannot make the base growth undetectable over enough headroom.
        assert!(second.as_secs_f64() + 1.0 > first.as_secs_f64());
    }

    #[test]
    fn exhausts_after_configured_retries() {
        let mut b = Backoff::new(3, 0.001);
        for _ in 0..3 {
            assert!(matches!(b.next(), BackoffOutcome::Delay(_)));
        }
        assert_eq!(b.next(), BackoffOutcome::Exhausted);
        assert_eq!(b.next(), BackoffOutcome::Exhausted);
    }

    #[test]
    fn reset_clears_the_counter() {
        let mut b = Backoff::new(1, 0.001);
        assert!(matches!(b.next(), BackoffOutcome::Delay(_)));
        assert_eq!(b.next(), BackoffOutcome::Exhausted);
        b.reset();
        assert_eq!(b.retry_count(), 0);
        assert!(matches!(b.next(), BackoffOutcome::Delay(_)));
    }

    #[test]
    fn zero_retries_is_immediately_exhausted() {
        let mut b = Backoff::new(0, 0.01);
        assert_eq!(b.next(), BackoffOutcome::Exhausted);
    }
}
