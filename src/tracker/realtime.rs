//! Real-time pacing wrapper
//!
//! Simulates a tracker that has to keep up with a live camera. When the
//! tracker spends more than `interval` seconds on a frame, the overrun is
//! carried as debt and the following frames are answered with the last
//! prediction until the debt is paid off. The first `grace` slow frames
//! after (re)initialization are forgiven.

use tracing::trace;

use super::{Properties, TrackerOutput, TrackerRuntime};
use crate::region::{Region, UNKNOWN};
use crate::sequence::Frame;
use crate::Result;

/// Runtime decorator enforcing a per-frame time budget.
pub struct RealtimeRuntime<R> {
    inner: R,
    grace: u32,
    interval: f64,
    countdown: u32,
    debt: f64,
    last: Option<Region>,
}

impl<R: TrackerRuntime> RealtimeRuntime<R> {
    /// Wrap `inner` with `grace` forgiven frames and a budget of `interval` seconds.
    #[must_use]
    pub const fn new(inner: R, grace: u32, interval: f64) -> Self {
        Self {
            inner,
            grace,
            interval,
            countdown: 0,
            debt: 0.0,
            last: None,
        }
    }

    /// Grace period in frames.
    #[must_use]
    pub const fn grace(&self) -> u32 {
        self.grace
    }

    /// Per-frame budget in seconds.
    #[must_use]
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Unwrap the inner runtime.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn account(&mut self, output: &TrackerOutput) {
        if output.elapsed > self.interval {
            if self.countdown > 0 {
                self.countdown -= 1;
                self.debt = 0.0;
            } else {
                self.debt = output.elapsed - self.interval;
                self.last = Some(output.region.clone());
            }
        } else {
            self.debt = 0.0;
        }
    }
}

impl<R: TrackerRuntime> TrackerRuntime for RealtimeRuntime<R> {
    fn tracker(&self) -> &str {
        self.inner.tracker()
    }

    fn initialize(&mut self, frame: &Frame, region: &Region) -> Result<TrackerOutput> {
        self.countdown = self.grace;
        self.last = None;
        let output = self.inner.initialize(frame, region)?;
        self.account(&output);
        Ok(output)
    }

    fn update(&mut self, frame: &Frame) -> Result<TrackerOutput> {
        if self.debt > self.interval {
            self.debt -= self.interval;
            trace!(frame = frame.index(), debt = self.debt, "Frame skipped by pacing");
            let region = self.last.clone().unwrap_or(Region::Special(UNKNOWN));
            return Ok(TrackerOutput {
                region,
                properties: Properties::new(),
                elapsed: 0.0,
            });
        }

        self.last = None;
        self.debt = 0.0;
        let output = self.inner.update(frame)?;
        self.account(&output);
        Ok(output)
    }

    fn pacing(&self) -> Option<(u32, f64)> {
        Some((self.grace, self.interval))
    }
}
