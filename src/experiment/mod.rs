//! Experiment protocols and the run loop
//!
//! An [`Experiment`] is one configured evaluation protocol. Every protocol
//! shares the immutable configuration in [`ExperimentCore`] (identifier,
//! storage, transformers, real-time pacing) and implements two operations:
//! [`Experiment::execute`] and [`Experiment::scan`].
//!
//! ## Overview
//!
//! ```text
//! run_experiment ──> Experiment::transform ──> Experiment::execute
//!                                                  │
//!                                                  ├──> realtime_runtime ──> TrackerRuntime
//!                                                  └──> Results (Storage)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trackbench::experiment::{ExperimentCore, UnsupervisedExperiment, UnsupervisedOptions};
//! use trackbench::storage::MemoryStorage;
//!
//! let core = ExperimentCore::builder("baseline", Arc::new(MemoryStorage::new())).build()?;
//! let experiment = UnsupervisedExperiment::new(core, UnsupervisedOptions::default())?;
//! # Ok::<(), trackbench::Error>(())
//! ```

mod config;
mod multirun;
mod multistart;
mod progress;
mod realtime;
mod runner;

pub use config::{ExperimentConfig, Protocol};
pub use multirun::{
    SupervisedExperiment, SupervisedOptions, UnsupervisedExperiment, UnsupervisedOptions,
};
pub use multistart::{find_anchors, MultiStartExperiment, MultiStartOptions};
pub use progress::{EvaluationProgress, LogProgress, ProgressBar};
pub use realtime::{realtime_runtime, RealtimeConfig};
pub use runner::{run_experiment, run_experiment_with_progress, RunSummary, SequenceFailure};

use std::fmt;
use std::sync::Arc;

use crate::region::Region;
use crate::sequence::Sequence;
use crate::storage::{LogHandle, Results, Storage};
use crate::tracker::{Tracker, TrackerRuntime};
use crate::transform::{self, Transformer};
use crate::Result;

/// Progress callback handed to [`Experiment::execute`]; receives values in [0, 1].
pub type ProgressCallback<'a> = &'a mut dyn FnMut(f64);

/// Configuration shared by every experiment protocol.
pub struct ExperimentCore {
    identifier: String,
    storage: Arc<dyn Storage>,
    transformers: Vec<Box<dyn Transformer>>,
    realtime: Option<RealtimeConfig>,
    // Reserved for noise and fault injection; stored but not yet read.
    noise: Option<serde_json::Value>,
    inject: Option<serde_json::Value>,
}

impl ExperimentCore {
    /// Create a builder for an experiment configuration.
    #[must_use]
    pub fn builder(identifier: impl Into<String>, storage: Arc<dyn Storage>) -> ExperimentCoreBuilder {
        ExperimentCoreBuilder::new(identifier, storage)
    }

    /// Experiment identifier, the namespace key into storage.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Shared storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Number of configured transformers.
    #[must_use]
    pub fn transformer_count(&self) -> usize {
        self.transformers.len()
    }

    /// Real-time pacing configuration, if any.
    #[must_use]
    pub const fn realtime(&self) -> Option<&RealtimeConfig> {
        self.realtime.as_ref()
    }

    /// Reserved noise configuration.
    #[must_use]
    pub const fn noise(&self) -> Option<&serde_json::Value> {
        self.noise.as_ref()
    }

    /// Reserved injection configuration.
    #[must_use]
    pub const fn inject(&self) -> Option<&serde_json::Value> {
        self.inject.as_ref()
    }
}

impl fmt::Debug for ExperimentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentCore")
            .field("identifier", &self.identifier)
            .field("transformers", &self.transformers.len())
            .field("realtime", &self.realtime)
            .field("noise", &self.noise)
            .field("inject", &self.inject)
            .finish_non_exhaustive()
    }
}

/// Builder for `ExperimentCore`.
pub struct ExperimentCoreBuilder {
    identifier: String,
    storage: Arc<dyn Storage>,
    transformers: Vec<Box<dyn Transformer>>,
    realtime: Option<RealtimeConfig>,
    noise: Option<serde_json::Value>,
    inject: Option<serde_json::Value>,
}

impl ExperimentCoreBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(identifier: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            identifier: identifier.into(),
            storage,
            transformers: Vec::new(),
            realtime: None,
            noise: None,
            inject: None,
        }
    }

    /// Append a transformer; transformers run in insertion order.
    #[must_use]
    pub fn transformer(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// Append several transformers.
    #[must_use]
    pub fn transformers(mut self, transformers: Vec<Box<dyn Transformer>>) -> Self {
        self.transformers.extend(transformers);
        self
    }

    /// Enable real-time pacing.
    #[must_use]
    pub fn realtime(mut self, realtime: Option<RealtimeConfig>) -> Self {
        self.realtime = realtime;
        self
    }

    /// Set the reserved noise configuration.
    #[must_use]
    pub fn noise(mut self, noise: Option<serde_json::Value>) -> Self {
        self.noise = noise;
        self
    }

    /// Set the reserved injection configuration.
    #[must_use]
    pub fn inject(mut self, inject: Option<serde_json::Value>) -> Self {
        self.inject = inject;
        self
    }

    /// Build the `ExperimentCore`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the identifier is empty or the real-time
    /// configuration is out of range.
    pub fn build(self) -> Result<ExperimentCore> {
        if self.identifier.trim().is_empty() {
            return Err(crate::Error::Config(
                "experiment identifier must not be empty".to_string(),
            ));
        }
        if let Some(realtime) = &self.realtime {
            realtime.validate()?;
        }
        Ok(ExperimentCore {
            identifier: self.identifier,
            storage: self.storage,
            transformers: self.transformers,
            realtime: self.realtime,
            noise: self.noise,
            inject: self.inject,
        })
    }
}

/// What is already stored for a (tracker, sequence) pair.
pub struct ScanReport {
    /// Whether the protocol needs no further tracker runs
    pub complete: bool,
    /// Entries that make up the stored results
    pub files: Vec<String>,
    /// Results namespace that was scanned
    pub results: Box<dyn Results>,
}

impl fmt::Debug for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanReport")
            .field("complete", &self.complete)
            .field("files", &self.files)
            .field("results", &self.results.location())
            .finish()
    }
}

/// An evaluation protocol.
///
/// Implementors provide [`core`](Experiment::core), [`execute`](Experiment::execute)
/// and [`scan`](Experiment::scan); everything else is derived from the core.
pub trait Experiment: Send + Sync {
    /// Shared configuration.
    fn core(&self) -> &ExperimentCore;

    /// Run one full pass of the protocol for `tracker` on an already
    /// transformed `sequence`.
    ///
    /// Existing results are kept unless `force` is set. `callback` receives
    /// non-decreasing progress in [0, 1].
    ///
    /// # Errors
    ///
    /// Returns `Error::Tracker` on tracker-side failure. Configuration,
    /// sequence and storage errors are returned as their own kinds.
    fn execute(
        &self,
        tracker: &dyn Tracker,
        sequence: &Sequence,
        force: bool,
        callback: Option<ProgressCallback<'_>>,
    ) -> Result<()>;

    /// Inspect stored results without running the tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or the sequence does not
    /// suit the protocol.
    fn scan(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<ScanReport>;

    /// Experiment identifier.
    fn identifier(&self) -> &str {
        self.core().identifier()
    }

    /// Results namespace for (tracker, this experiment, sequence).
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    fn results(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<Box<dyn Results>> {
        self.core()
            .storage()
            .results(tracker, self.identifier(), sequence)
    }

    /// Open a scoped log sink for `identifier`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    fn log(&self, identifier: &str) -> Result<LogHandle> {
        self.core().storage().open_log(identifier)
    }

    /// Apply this experiment's transformers to `sequence`.
    ///
    /// # Errors
    ///
    /// Returns the first transformer error.
    fn transform(&self, sequence: Sequence) -> Result<Sequence> {
        transform::apply(&self.core().transformers, sequence)
    }

    /// Runtime for executing `tracker` on `sequence`, paced if configured.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for invalid pacing parameters (before the
    /// tracker is touched) or the tracker's own startup error.
    fn runtime(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<Box<dyn TrackerRuntime>> {
        realtime_runtime(self.core().realtime(), tracker, sequence)
    }

    /// Region used to (re)initialize the tracker on frame `index`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sequence` if the frame has no groundtruth.
    fn initialization(&self, sequence: &Sequence, index: usize) -> Result<Region> {
        sequence.groundtruth(index).cloned()
    }
}

/// Runtime output properties with the elapsed time recorded as `time`.
fn timed(output: crate::tracker::TrackerOutput) -> (Region, crate::tracker::Properties) {
    let mut properties = output.properties;
    properties.insert("time".to_string(), output.elapsed);
    (output.region, properties)
}

/// Fetch a runtime on first use so fully computed sequences never start the tracker.
fn acquire<'a>(
    slot: &'a mut Option<Box<dyn TrackerRuntime>>,
    experiment: &(impl Experiment + ?Sized),
    tracker: &dyn Tracker,
    sequence: &Sequence,
) -> Result<&'a mut Box<dyn TrackerRuntime>> {
    let runtime = match slot.take() {
        Some(runtime) => runtime,
        None => experiment.runtime(tracker, sequence)?,
    };
    Ok(slot.insert(runtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::transform::Downsample;
    use crate::Error;
    use std::io::Write;

    fn experiment(core: ExperimentCore) -> UnsupervisedExperiment {
        UnsupervisedExperiment::new(core, UnsupervisedOptions::default()).unwrap()
    }

    #[test]
    fn test_builder_rejects_empty_identifier() {
        let result = ExperimentCore::builder("  ", Arc::new(MemoryStorage::new())).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_realtime() {
        let result = ExperimentCore::builder("baseline", Arc::new(MemoryStorage::new()))
            .realtime(Some(RealtimeConfig::new(-3, 20.0)))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_transform_uses_core_transformers() {
        let core = ExperimentCore::builder("baseline", Arc::new(MemoryStorage::new()))
            .transformer(Box::new(Downsample::new(2).unwrap()))
            .transformer(Box::new(Downsample::new(2).unwrap()))
            .build()
            .unwrap();
        assert_eq!(core.transformer_count(), 2);

        let sequence = Sequence::builder("ball")
            .frames(8, &Region::rectangle(0.0, 0.0, 1.0, 1.0))
            .build();
        let transformed = experiment(core).transform(sequence).unwrap();
        assert_eq!(transformed.length(), 2);
        assert_eq!(transformed.frame(1).unwrap().index(), 4);
    }

    #[test]
    fn test_log_goes_through_storage() {
        let storage = MemoryStorage::new();
        let core = ExperimentCore::builder("baseline", Arc::new(storage.clone()))
            .build()
            .unwrap();
        let experiment = experiment(core);

        {
            let mut log = experiment.log("ncc").unwrap();
            log.write_all(b"stderr").unwrap();
        }

        let keys = storage.keys("logs/ncc_");
        assert_eq!(keys.len(), 1);
        assert_eq!(storage.get(&keys[0]).as_deref(), Some("stderr"));
    }

    #[test]
    fn test_initialization_is_groundtruth() {
        let core = ExperimentCore::builder("baseline", Arc::new(MemoryStorage::new()))
            .build()
            .unwrap();
        let sequence = Sequence::builder("ball")
            .frames(2, &Region::rectangle(1.0, 2.0, 3.0, 4.0))
            .build();
        let experiment = experiment(core);

        assert_eq!(
            experiment.initialization(&sequence, 1).unwrap(),
            Region::rectangle(1.0, 2.0, 3.0, 4.0)
        );
        assert!(experiment.initialization(&sequence, 2).is_err());
    }
}
