//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that many views
//! retrying against the same backend do not hit it in lockstep.
//!
//! - [`JitterPolicy::None`]: exact backoff delay
//! - [`JitterPolicy::Additive`]: delay + random[0, ratio × delay] (default, ratio 0.1)
//! - [`JitterPolicy::Full`]: random[0, delay]
//! - [`JitterPolicy::Equal`]: delay/2 + random[0, delay/2]

use rand::Rng;
use std::time::Duration;

/// Ratio used by the default additive jitter.
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

/// Policy controlling randomization of retry delays.
///
/// Jitter is always applied to a base derived from the attempt number, never
/// to a previous jittered delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    None,

    /// Additive jitter: `delay + random[0, ratio × delay]`.
    ///
    /// Never shortens the delay; with the default ratio the result lies in
    /// `[delay, 1.1 × delay]`.
    Additive { ratio: f64 },

    /// Full jitter: random delay in `[0, delay]`.
    Full,

    /// Equal jitter: `delay/2 + random[0, delay/2]`.
    Equal,
}

impl Default for JitterPolicy {
    /// Returns additive jitter with a 10% ratio.
    fn default() -> Self {
        JitterPolicy::Additive {
            ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl JitterPolicy {
    /// Applies jitter to the given base delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Additive { ratio } => additive_jitter(delay, *ratio),
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
        }
    }
}

/// delay + random[0, ratio × delay]
fn additive_jitter(delay: Duration, ratio: f64) -> Duration {
    let span = delay.as_secs_f64() * ratio;
    if !span.is_finite() || span <= 0.0 {
        return delay;
    }
    let extra = rand::rng().random_range(0.0..=span);
    delay.saturating_add(Duration::from_secs_f64(extra))
}

/// random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// delay/2 + random[0, delay/2]
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}
