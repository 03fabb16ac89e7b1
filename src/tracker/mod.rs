//! Tracker and runtime interfaces
//!
//! A [`Tracker`] is the subject under evaluation. It is a factory for
//! [`TrackerRuntime`] sessions; how a runtime talks to the tracker process
//! is up to the implementation. Dropping a runtime ends its session.

mod realtime;

pub use realtime::RealtimeRuntime;

use std::collections::BTreeMap;

use crate::region::Region;
use crate::sequence::Frame;
use crate::Result;

/// Extra per-frame properties reported by a tracker (e.g. confidence).
pub type Properties = BTreeMap<String, f64>;

/// Output of a single runtime call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutput {
    /// Predicted region
    pub region: Region,
    /// Tracker-reported properties
    pub properties: Properties,
    /// Time the tracker spent on the frame, in seconds
    pub elapsed: f64,
}

impl TrackerOutput {
    /// Output with no extra properties.
    #[must_use]
    pub const fn new(region: Region, elapsed: f64) -> Self {
        Self {
            region,
            properties: BTreeMap::new(),
            elapsed,
        }
    }
}

/// A live tracking session.
///
/// Implementations return `Error::Tracker` when the tracker crashes, times
/// out or produces invalid output.
pub trait TrackerRuntime {
    /// Identifier of the tracker driving this session.
    fn tracker(&self) -> &str;

    /// (Re)initialize the tracker on `frame` with the given region.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tracker` on tracker-side failure.
    fn initialize(&mut self, frame: &Frame, region: &Region) -> Result<TrackerOutput>;

    /// Track the object into `frame`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tracker` on tracker-side failure.
    fn update(&mut self, frame: &Frame) -> Result<TrackerOutput>;

    /// Pacing parameters `(grace, interval)` when wrapped by [`RealtimeRuntime`].
    fn pacing(&self) -> Option<(u32, f64)> {
        None
    }
}

impl<R: TrackerRuntime + ?Sized> TrackerRuntime for Box<R> {
    fn tracker(&self) -> &str {
        (**self).tracker()
    }

    fn initialize(&mut self, frame: &Frame, region: &Region) -> Result<TrackerOutput> {
        (**self).initialize(frame, region)
    }

    fn update(&mut self, frame: &Frame) -> Result<TrackerOutput> {
        (**self).update(frame)
    }

    fn pacing(&self) -> Option<(u32, f64)> {
        (**self).pacing()
    }
}

/// The subject under evaluation.
pub trait Tracker: Send + Sync {
    /// Identifier used for result keys, logs and progress labels.
    fn identifier(&self) -> &str;

    /// Start a new runtime session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tracker` if the session cannot be started.
    fn runtime(&self) -> Result<Box<dyn TrackerRuntime>>;
}
