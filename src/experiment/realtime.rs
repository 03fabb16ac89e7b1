//! Real-time runtime decision
//!
//! Decides per execution whether a tracker runs free or under the pacing
//! wrapper, and with which per-frame budget. Nothing is cached: the budget
//! depends on the frame rate of the sequence being executed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sequence::Sequence;
use crate::tracker::{RealtimeRuntime, Tracker, TrackerRuntime};
use crate::{Error, Result};

/// Frame rate assumed when neither the sequence nor the config declares one.
pub const DEFAULT_FPS: f64 = 20.0;

/// Real-time pacing configuration: `{"grace": 0, "fps": 20}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Slow frames forgiven after each (re)initialization, must be >= 0
    #[serde(default)]
    pub grace: i64,
    /// Fallback frame rate, must be > 0
    #[serde(default = "default_fps")]
    pub fps: f64,
}

const fn default_fps() -> f64 {
    DEFAULT_FPS
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            grace: 0,
            fps: DEFAULT_FPS,
        }
    }
}

impl RealtimeConfig {
    /// Create a configuration (not yet validated).
    #[must_use]
    pub const fn new(grace: i64, fps: f64) -> Self {
        Self { grace, fps }
    }

    /// Check ranges and return the grace period as a frame count.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for negative grace or non-positive fps.
    pub fn validate(&self) -> Result<u32> {
        if self.grace < 0 {
            return Err(Error::Config(format!(
                "realtime grace must be a non-negative frame count, got {}",
                self.grace
            )));
        }
        let grace = u32::try_from(self.grace).map_err(|_| {
            Error::Config(format!(
                "realtime grace must be at most {} frames, got {}",
                u32::MAX,
                self.grace
            ))
        })?;
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(Error::Config(format!(
                "realtime fps must be positive, got {}",
                self.fps
            )));
        }
        Ok(grace)
    }

    /// Per-frame budget in seconds for `sequence`.
    ///
    /// The sequence's declared `fps` metadata wins over the configured one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the effective frame rate is not a positive number.
    pub fn interval(&self, sequence: &Sequence) -> Result<f64> {
        let fps = match sequence.metadata_number("fps") {
            Ok(declared) => declared.unwrap_or(self.fps),
            Err(e) => return Err(Error::Config(e.to_string())),
        };
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::Config(format!(
                "sequence {} has non-positive fps {fps}",
                sequence.name()
            )));
        }
        Ok(1.0 / fps)
    }
}

/// Runtime for `tracker` on `sequence`.
///
/// Without `realtime` this is exactly `tracker.runtime()`. Otherwise the
/// configuration is validated first, so an invalid one never starts the
/// tracker, and the runtime is wrapped in a [`RealtimeRuntime`].
///
/// # Errors
///
/// Returns `Error::Config` for invalid pacing parameters, or the tracker's
/// startup error.
pub fn realtime_runtime(
    realtime: Option<&RealtimeConfig>,
    tracker: &dyn Tracker,
    sequence: &Sequence,
) -> Result<Box<dyn TrackerRuntime>> {
    let Some(config) = realtime else {
        return tracker.runtime();
    };

    let grace = config.validate()?;
    let interval = config.interval(sequence)?;
    debug!(
        tracker = tracker.identifier(),
        sequence = sequence.name(),
        grace,
        interval,
        "Pacing tracker runtime"
    );
    Ok(Box::new(RealtimeRuntime::new(tracker.runtime()?, grace, interval)))
}
