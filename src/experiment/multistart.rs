//! Multi-start protocol
//!
//! Frames flagged with a positive `anchor` value start a forward run to the
//! end of the sequence; negative values start a backward run to the first
//! frame. Each run is stored as `<sequence>_<anchor index, 8 digits>`.

use serde::{Deserialize, Serialize};

use super::{acquire, timed, Experiment, ExperimentCore, ProgressCallback, ScanReport};
use crate::region::{Region, INITIALIZATION};
use crate::sequence::Sequence;
use crate::tracker::{Tracker, TrackerRuntime};
use crate::trajectory::Trajectory;
use crate::{Error, Result};

fn default_anchor() -> String {
    "anchor".to_string()
}

/// Forward and backward anchor frames of `sequence`, in frame order.
#[must_use]
pub fn find_anchors(sequence: &Sequence, anchor: &str) -> (Vec<usize>, Vec<usize>) {
    let mut forward = Vec::new();
    let mut backward = Vec::new();
    for frame in 0..sequence.length() {
        match sequence.values(frame).and_then(|values| values.get(anchor)) {
            Some(&value) if value > 0.0 => forward.push(frame),
            Some(&value) if value < 0.0 => backward.push(frame),
            _ => {}
        }
    }
    (forward, backward)
}

/// Parameters of [`MultiStartExperiment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiStartOptions {
    /// Per-frame value that marks anchors
    #[serde(default = "default_anchor")]
    pub anchor: String,
}

impl Default for MultiStartOptions {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
        }
    }
}

/// Track from every anchor frame, forward or backward.
#[derive(Debug)]
pub struct MultiStartExperiment {
    core: ExperimentCore,
    anchor: String,
}

impl MultiStartExperiment {
    /// Create the protocol.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the anchor key is empty.
    pub fn new(core: ExperimentCore, options: MultiStartOptions) -> Result<Self> {
        if options.anchor.is_empty() {
            return Err(Error::Config("anchor key must not be empty".to_string()));
        }
        Ok(Self {
            core,
            anchor: options.anchor,
        })
    }

    /// Per-frame value that marks anchors.
    #[must_use]
    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    fn name(sequence: &Sequence, anchor: usize) -> String {
        format!("{}_{anchor:08}", sequence.name())
    }

    fn anchors(&self, sequence: &Sequence) -> Result<(Vec<usize>, Vec<usize>)> {
        let (forward, backward) = find_anchors(sequence, &self.anchor);
        if forward.is_empty() && backward.is_empty() {
            return Err(Error::Sequence(format!(
                "sequence {} does not contain any anchors",
                sequence.name()
            )));
        }
        Ok((forward, backward))
    }

    fn run(&self, runtime: &mut dyn TrackerRuntime, proxy: &Sequence) -> Result<Trajectory> {
        let mut trajectory = Trajectory::new(proxy.length());

        let output = runtime.initialize(proxy.frame(0)?, &self.initialization(proxy, 0)?)?;
        let (_, properties) = timed(output);
        trajectory.set(0, Region::Special(INITIALIZATION), properties)?;

        for frame in 1..proxy.length() {
            let (region, properties) = timed(runtime.update(proxy.frame(frame)?)?);
            trajectory.set(frame, region, properties)?;
        }

        Ok(trajectory)
    }
}

impl Experiment for MultiStartExperiment {
    fn core(&self) -> &ExperimentCore {
        &self.core
    }

    fn execute(
        &self,
        tracker: &dyn Tracker,
        sequence: &Sequence,
        force: bool,
        mut callback: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        let results = self.results(tracker, sequence)?;
        let (forward, backward) = self.anchors(sequence)?;
        let total = forward.len() + backward.len();
        let mut done = 0usize;
        let mut runtime = None;

        for (reverse, anchors) in [(false, forward), (true, backward)] {
            for anchor in anchors {
                let name = Self::name(sequence, anchor);

                if force || !Trajectory::exists(results.as_ref(), &name) {
                    let indices: Vec<usize> = if reverse {
                        (0..=anchor).rev().collect()
                    } else {
                        (anchor..sequence.length()).collect()
                    };
                    let proxy = sequence.remap(&indices)?;

                    let runtime = acquire(&mut runtime, self, tracker, sequence)?;
                    let trajectory = self.run(&mut **runtime, &proxy)?;
                    trajectory.write(results.as_ref(), &name)?;
                }

                done += 1;
                if let Some(callback) = callback.as_deref_mut() {
                    #[allow(clippy::cast_precision_loss)]
                    callback(done as f64 / total as f64);
                }
            }
        }

        Ok(())
    }

    fn scan(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<ScanReport> {
        let results = self.results(tracker, sequence)?;
        let (forward, backward) = self.anchors(sequence)?;
        let mut files = Vec::new();
        let mut complete = true;

        for anchor in forward.into_iter().chain(backward) {
            let name = Self::name(sequence, anchor);
            if !Trajectory::exists(results.as_ref(), &name) {
                complete = false;
                break;
            }
            files.extend(Trajectory::gather(results.as_ref(), &name)?);
        }

        Ok(ScanReport {
            complete,
            files,
            results,
        })
    }
}
