//! Hand-off rate limiting.
//!
//! Every captured frame is *offered* to the plugin hand-off, but actual
//! plugin calls are capped at `max_inference_fps`. Frames over the rate are
//! dropped on the spot; nothing is ever queued, so the plugin only ever sees
//! fresh frames.
//!
//! The gate takes the current instant as an argument instead of reading the
//! clock, which keeps the throttle testable without sleeping.

use std::time::{Duration, Instant};

/// Default hand-off rate when the configured value is unusable.
pub const DEFAULT_MAX_INFERENCE_FPS: u32 = 8;

/// Coerce a raw fps setting into a usable rate.
///
/// Non-finite and non-positive values fall back to the default; fractional
/// values truncate. So `7.9` becomes 7, while `0.5`, `-3`, and `NaN` all
/// become [`DEFAULT_MAX_INFERENCE_FPS`].
pub fn coerce_max_fps(raw: f64) -> u32 {
    if !raw.is_finite() {
        return DEFAULT_MAX_INFERENCE_FPS;
    }
    let truncated = raw.trunc();
    if truncated < 1.0 {
        return DEFAULT_MAX_INFERENCE_FPS;
    }
    truncated as u32
}

/// Token gate spacing permits at least `1/max_fps` apart.
///
/// Spacing (rather than counting per fixed window) keeps any sliding
/// one-second window at or under `max_fps` permits, give or take the frame
/// that straddles the window edge.
pub struct FpsGate {
    min_interval: Duration,
    last_permit: Option<Instant>,
}

impl FpsGate {
    pub fn new(max_fps: u32) -> Self {
        let fps = max_fps.max(1);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / f64::from(fps)),
            last_permit: None,
        }
    }

    /// Permit a hand-off at `now`, or refuse it if the previous permit is too
    /// recent. Refused frames are simply dropped by the caller.
    pub fn try_permit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_permit {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_permit = Some(now);
        true
    }

    /// Forget the last permit, e.g. after a device rebind.
    pub fn reset(&mut self) {
        self.last_permit = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
