pub mod parsing;
pub mod state;

pub use parsing::env_parse;
pub use state::{HasPlaybackState, IdleReason, PlaybackStatus};

use rand::Rng;
use std::time::Duration;

/// Spreads periodic re-checks by +/-30% so that several keepers woken by the
/// same network change do not probe in lockstep.
pub(crate) fn jittered(base: Duration) -> Duration {
    let jitter_factor = rand::rng().random_range(-0.3f32..0.3f32);
    let jitter = base.mul_f32(jitter_factor.abs());
    let delay = if jitter_factor >= 0.0 {
        base + jitter
    } else {
        base.saturating_sub(jitter)
    };
    delay.max(Duration::from_millis(1))
}
