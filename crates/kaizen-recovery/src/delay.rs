//! Backoff delay calculation.

use crate::types::{BackoffStrategy, RetryConfig};
use rand::Rng;

/// Computes the delay before attempt `n` (1-indexed), capped at
/// `max_delay_ms` and optionally jittered by a uniform offset in
/// `[-0.5*delay, +0.5*delay]`, clamped to non-negative.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> u64 {
    debug_assert!(attempt >= 1);
    let base = match config.strategy {
        BackoffStrategy::Exponential => {
            config.initial_delay_ms as f64 * 2f64.powi(attempt as i32 - 1)
        }
        BackoffStrategy::Linear => config.initial_delay_ms as f64 * attempt as f64,
        BackoffStrategy::Fixed => config.initial_delay_ms as f64,
    };
    let capped = base.min(config.max_delay_ms as f64);

    let delay = if config.jitter {
        let offset = rand::thread_rng().gen_range(-0.5..=0.5) * capped;
        (capped + offset).max(0.0)
    } else {
        capped
    };

    delay.round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: BackoffStrategy) -> RetryConfig {
        RetryConfig {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            strategy,
            jitter: false,
            circuit_breaker_threshold: 5,
        }
    }

    #[test]
    fn exponential_doubles_each_attempt() {
        let cfg = config(BackoffStrategy::Exponential);
        assert_eq!(calculate_delay(1, &cfg), 1000);
        assert_eq!(calculate_delay(2, &cfg), 2000);
        assert_eq!(calculate_delay(3, &cfg), 4000);
    }

    #[test]
    fn linear_scales_by_attempt_number() {
        let cfg = config(BackoffStrategy::Linear);
        assert_eq!(calculate_delay(1, &cfg), 1000);
        assert_eq!(calculate_delay(3, &cfg), 3000);
    }

    #[test]
    fn fixed_never_changes() {
        let cfg = config(BackoffStrategy::Fixed);
        assert_eq!(calculate_delay(1, &cfg), 1000);
        assert_eq!(calculate_delay(10, &cfg), 1000);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let cfg = config(BackoffStrategy::Exponential);
        assert_eq!(calculate_delay(10, &cfg), 30_000);
    }

    #[test]
    fn jitter_stays_within_bounds_and_non_negative() {
        let mut cfg = config(BackoffStrategy::Fixed);
        cfg.jitter = true;
        for _ in 0..50 {
            let delay = calculate_delay(1, &cfg);
            assert!(delay <= 1500);
        }
    }
}
