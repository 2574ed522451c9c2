//! Exponential backoff with jitter.

use std::time::Duration;

/// Calculate `base × multiplier^attempt`, capped at `max`, then scaled by a random
/// factor in `[1 − jitter, 1 + jitter)`.
///
/// `attempt` is zero-based: the first retry uses `attempt = 0`.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    multiplier: f64,
    max: Duration,
    jitter_fraction: f64,
) -> Duration {
    let unjittered = exponential(attempt, base, multiplier, max);
    apply_jitter(unjittered, jitter_fraction, fastrand::f64())
}

fn exponential(attempt: u32, base: Duration, multiplier: f64, max: Duration) -> Duration {
    let scale = multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
    let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
    Duration::from_secs_f64(seconds.max(0.0))
}

/// `sample` is a uniform draw from `[0, 1)`.
fn apply_jitter(delay: Duration, jitter_fraction: f64, sample: f64) -> Duration {
    let jitter = jitter_fraction.clamp(0.0, 1.0);
    let factor = 1.0 + jitter * (2.0 * sample - 1.0);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}
