//! Repeated single-start protocols: unsupervised and supervised tracking
//!
//! Both protocols run the tracker over the whole sequence `repetitions`
//! times and store one trajectory per repetition as `<sequence>_<NNN>`.
//! With `early_stop`, repetitions stop once three stored runs are identical,
//! since a deterministic tracker will not produce anything new.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{acquire, timed, Experiment, ExperimentCore, ProgressCallback, ScanReport};
use crate::region::{calculate_overlap, Region, FAILURE, INITIALIZATION};
use crate::sequence::Sequence;
use crate::storage::Results;
use crate::tracker::{Tracker, TrackerRuntime};
use crate::trajectory::Trajectory;
use crate::{Error, Result};

/// Identical runs required before early stopping kicks in.
const EARLY_STOP_RUNS: usize = 3;

const fn default_repetitions() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_skip_initialize() -> usize {
    1
}

/// Repetition policy shared by both protocols.
#[derive(Debug, Clone, Copy)]
struct Repetitions {
    count: u32,
    early_stop: bool,
}

impl Repetitions {
    fn new(count: u32, early_stop: bool) -> Result<Self> {
        if count == 0 {
            return Err(Error::Config("repetitions must be at least 1".to_string()));
        }
        Ok(Self { count, early_stop })
    }

    fn name(sequence: &Sequence, repetition: u32) -> String {
        format!("{}_{repetition:03}", sequence.name())
    }

    fn gather(&self, results: &dyn Results, sequence: &Sequence) -> Result<Vec<Trajectory>> {
        let mut trajectories = Vec::new();
        for repetition in 1..=self.count {
            let name = Self::name(sequence, repetition);
            if Trajectory::exists(results, &name) {
                trajectories.push(Trajectory::read(results, &name)?);
            }
        }
        Ok(trajectories)
    }

    fn can_stop(&self, results: &dyn Results, sequence: &Sequence) -> Result<bool> {
        if !self.early_stop {
            return Ok(false);
        }
        let trajectories = self.gather(results, sequence)?;
        if trajectories.len() < EARLY_STOP_RUNS {
            return Ok(false);
        }
        Ok(trajectories[1..]
            .iter()
            .all(|trajectory| trajectory.equals(&trajectories[0])))
    }

    fn scan(&self, results: Box<dyn Results>, sequence: &Sequence) -> Result<ScanReport> {
        let mut files = Vec::new();
        let mut complete = true;

        for repetition in 1..=self.count {
            let name = Self::name(sequence, repetition);
            if Trajectory::exists(results.as_ref(), &name) {
                files.extend(Trajectory::gather(results.as_ref(), &name)?);
            } else if self.can_stop(results.as_ref(), sequence)? {
                break;
            } else {
                complete = false;
                break;
            }
        }

        Ok(ScanReport {
            complete,
            files,
            results,
        })
    }

    /// Drive `run` once per missing repetition.
    fn execute<E, F>(
        &self,
        experiment: &E,
        tracker: &dyn Tracker,
        sequence: &Sequence,
        force: bool,
        mut callback: Option<ProgressCallback<'_>>,
        mut run: F,
    ) -> Result<()>
    where
        E: Experiment + ?Sized,
        F: FnMut(&mut dyn TrackerRuntime) -> Result<Trajectory>,
    {
        let results = experiment.results(tracker, sequence)?;
        let mut runtime = None;

        for repetition in 1..=self.count {
            let name = Self::name(sequence, repetition);

            if force || !Trajectory::exists(results.as_ref(), &name) {
                // Forced runs recompute every repetition
                if !force && self.can_stop(results.as_ref(), sequence)? {
                    debug!(
                        tracker = tracker.identifier(),
                        sequence = sequence.name(),
                        repetition,
                        "Stored runs are identical, stopping early"
                    );
                    if let Some(callback) = callback.as_deref_mut() {
                        callback(1.0);
                    }
                    return Ok(());
                }

                let runtime = acquire(&mut runtime, experiment, tracker, sequence)?;
                let trajectory = run(&mut **runtime)?;
                trajectory.write(results.as_ref(), &name)?;
            }

            if let Some(callback) = callback.as_deref_mut() {
                callback(f64::from(repetition) / f64::from(self.count));
            }
        }

        Ok(())
    }
}

/// Parameters of [`UnsupervisedExperiment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupervisedOptions {
    /// Runs per sequence
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    /// Stop once stored runs are identical
    #[serde(default = "default_true")]
    pub early_stop: bool,
}

impl Default for UnsupervisedOptions {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            early_stop: true,
        }
    }
}

/// Initialize once, then track to the end of the sequence without intervention.
#[derive(Debug)]
pub struct UnsupervisedExperiment {
    core: ExperimentCore,
    repetitions: Repetitions,
}

impl UnsupervisedExperiment {
    /// Create the protocol.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `repetitions` is zero.
    pub fn new(core: ExperimentCore, options: UnsupervisedOptions) -> Result<Self> {
        Ok(Self {
            core,
            repetitions: Repetitions::new(options.repetitions, options.early_stop)?,
        })
    }

    /// Runs per sequence.
    #[must_use]
    pub const fn repetitions(&self) -> u32 {
        self.repetitions.count
    }

    fn run(&self, runtime: &mut dyn TrackerRuntime, sequence: &Sequence) -> Result<Trajectory> {
        let mut trajectory = Trajectory::new(sequence.length());

        let output = runtime.initialize(sequence.frame(0)?, &self.initialization(sequence, 0)?)?;
        let (_, properties) = timed(output);
        trajectory.set(0, Region::Special(INITIALIZATION), properties)?;

        for frame in 1..sequence.length() {
            let (region, properties) = timed(runtime.update(sequence.frame(frame)?)?);
            trajectory.set(frame, region, properties)?;
        }

        Ok(trajectory)
    }
}

impl Experiment for UnsupervisedExperiment {
    fn core(&self) -> &ExperimentCore {
        &self.core
    }

    fn execute(
        &self,
        tracker: &dyn Tracker,
        sequence: &Sequence,
        force: bool,
        callback: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        self.repetitions
            .execute(self, tracker, sequence, force, callback, |runtime| {
                self.run(runtime, sequence)
            })
    }

    fn scan(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<ScanReport> {
        self.repetitions
            .scan(self.results(tracker, sequence)?, sequence)
    }
}

/// Parameters of [`SupervisedExperiment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisedOptions {
    /// Runs per sequence
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    /// Stop once stored runs are identical
    #[serde(default = "default_true")]
    pub early_stop: bool,
    /// Frames skipped after a failure before re-initialization
    #[serde(default = "default_skip_initialize")]
    pub skip_initialize: usize,
    /// Frames with any of these tags are not used for re-initialization
    #[serde(default)]
    pub skip_tags: Vec<String>,
    /// Overlap at or below which a prediction counts as a failure
    #[serde(default)]
    pub failure_overlap: f32,
}

impl Default for SupervisedOptions {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            early_stop: true,
            skip_initialize: default_skip_initialize(),
            skip_tags: Vec::new(),
            failure_overlap: 0.0,
        }
    }
}

/// Track with re-initialization after every detected failure.
#[derive(Debug)]
pub struct SupervisedExperiment {
    core: ExperimentCore,
    repetitions: Repetitions,
    skip_initialize: usize,
    skip_tags: Vec<String>,
    failure_overlap: f32,
}

impl SupervisedExperiment {
    /// Create the protocol.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `repetitions` or `skip_initialize` is zero,
    /// or `failure_overlap` is outside [0, 1].
    pub fn new(core: ExperimentCore, options: SupervisedOptions) -> Result<Self> {
        if options.skip_initialize == 0 {
            return Err(Error::Config(
                "skip_initialize must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&options.failure_overlap) {
            return Err(Error::Config(format!(
                "failure_overlap must be within [0, 1], got {}",
                options.failure_overlap
            )));
        }
        Ok(Self {
            core,
            repetitions: Repetitions::new(options.repetitions, options.early_stop)?,
            skip_initialize: options.skip_initialize,
            skip_tags: options.skip_tags,
            failure_overlap: options.failure_overlap,
        })
    }

    /// Runs per sequence.
    #[must_use]
    pub const fn repetitions(&self) -> u32 {
        self.repetitions.count
    }

    fn skipped(&self, sequence: &Sequence, frame: usize) -> bool {
        sequence
            .tags(frame)
            .iter()
            .any(|tag| self.skip_tags.contains(tag))
    }

    fn run(&self, runtime: &mut dyn TrackerRuntime, sequence: &Sequence) -> Result<Trajectory> {
        let length = sequence.length();
        let mut trajectory = Trajectory::new(length);
        let mut frame = 0;

        while frame < length {
            let output =
                runtime.initialize(sequence.frame(frame)?, &self.initialization(sequence, frame)?)?;
            let (_, properties) = timed(output);
            trajectory.set(frame, Region::Special(INITIALIZATION), properties)?;
            frame += 1;

            while frame < length {
                let (region, properties) = timed(runtime.update(sequence.frame(frame)?)?);
                let overlap =
                    calculate_overlap(&region, sequence.groundtruth(frame)?, sequence.size());

                if overlap <= self.failure_overlap {
                    trajectory.set(frame, Region::Special(FAILURE), properties)?;
                    frame += self.skip_initialize;
                    while frame < length && self.skipped(sequence, frame) {
                        frame += 1;
                    }
                    break;
                }

                trajectory.set(frame, region, properties)?;
                frame += 1;
            }
        }

        Ok(trajectory)
    }
}

impl Experiment for SupervisedExperiment {
    fn core(&self) -> &ExperimentCore {
        &self.core
    }

    fn execute(
        &self,
        tracker: &dyn Tracker,
        sequence: &Sequence,
        force: bool,
        callback: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        self.repetitions
            .execute(self, tracker, sequence, force, callback, |runtime| {
                self.run(runtime, sequence)
            })
    }

    fn scan(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<ScanReport> {
        self.repetitions
            .scan(self.results(tracker, sequence)?, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::UNKNOWN;
    use crate::sequence::Frame;
    use crate::storage::MemoryStorage;
    use crate::tracker::TrackerOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Predicts a fixed rectangle, or an empty one on listed frames.
    struct Static {
        lost: Vec<usize>,
        sessions: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    struct StaticRuntime {
        lost: Vec<usize>,
        calls: Arc<AtomicUsize>,
    }

    impl Static {
        fn new(lost: &[usize]) -> Self {
            Self {
                lost: lost.to_vec(),
                sessions: Arc::new(AtomicUsize::new(0)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Tracker for Static {
        fn identifier(&self) -> &str {
            "static"
        }

        fn runtime(&self) -> Result<Box<dyn TrackerRuntime>> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StaticRuntime {
                lost: self.lost.clone(),
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    impl TrackerRuntime for StaticRuntime {
        fn tracker(&self) -> &str {
            "static"
        }

        fn initialize(&mut self, _frame: &Frame, region: &Region) -> Result<TrackerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TrackerOutput::new(region.clone(), 0.01))
        }

        fn update(&mut self, frame: &Frame) -> Result<TrackerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let region = if self.lost.contains(&frame.index()) {
                Region::rectangle(500.0, 500.0, 1.0, 1.0)
            } else {
                Region::rectangle(0.0, 0.0, 10.0, 10.0)
            };
            Ok(TrackerOutput::new(region, 0.01))
        }
    }

    fn core() -> ExperimentCore {
        ExperimentCore::builder("baseline", Arc::new(MemoryStorage::new()))
            .build()
            .unwrap()
    }

    fn sequence(frames: usize) -> Sequence {
        Sequence::builder("ball")
            .frames(frames, &Region::rectangle(0.0, 0.0, 10.0, 10.0))
            .build()
    }

    #[test]
    fn test_unsupervised_writes_one_trajectory_per_repetition() {
        let experiment = UnsupervisedExperiment::new(
            core(),
            UnsupervisedOptions {
                repetitions: 2,
                early_stop: false,
            },
        )
        .unwrap();
        let tracker = Static::new(&[]);
        let sequence = sequence(4);
        let mut progress = Vec::new();

        experiment
            .execute(&tracker, &sequence, false, Some(&mut |p: f64| progress.push(p)))
            .unwrap();

        assert_eq!(progress, vec![0.5, 1.0]);
        let report = experiment.scan(&tracker, &sequence).unwrap();
        assert!(report.complete);
        assert_eq!(report.files.len(), 4);

        let results = experiment.results(&tracker, &sequence).unwrap();
        let trajectory = Trajectory::read(results.as_ref(), "ball_001").unwrap();
        assert!(trajectory.region(0).unwrap().is_code(INITIALIZATION));
        assert_eq!(trajectory.region(3), Some(&Region::rectangle(0.0, 0.0, 10.0, 10.0)));
        assert!(trajectory.properties(1).unwrap().contains_key("time"));
    }

    #[test]
    fn test_existing_results_skip_tracker_unless_forced() {
        let experiment = UnsupervisedExperiment::new(core(), UnsupervisedOptions::default()).unwrap();
        let tracker = Static::new(&[]);
        let sequence = sequence(3);

        experiment.execute(&tracker, &sequence, false, None).unwrap();
        experiment.execute(&tracker, &sequence, false, None).unwrap();
        assert_eq!(tracker.sessions.load(Ordering::SeqCst), 1);

        experiment.execute(&tracker, &sequence, true, None).unwrap();
        assert_eq!(tracker.sessions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_force_overrides_early_stop() {
        let experiment = UnsupervisedExperiment::new(
            core(),
            UnsupervisedOptions {
                repetitions: 5,
                early_stop: true,
            },
        )
        .unwrap();
        let tracker = Static::new(&[]);
        let sequence = sequence(2);

        let mut progress = Vec::new();
        experiment
            .execute(&tracker, &sequence, false, Some(&mut |p: f64| progress.push(p)))
            .unwrap();
        assert_eq!(tracker.sessions.load(Ordering::SeqCst), 1);
        assert_eq!(progress, vec![0.2, 0.4, 0.6, 1.0]);

        let mut progress = Vec::new();
        experiment
            .execute(&tracker, &sequence, true, Some(&mut |p: f64| progress.push(p)))
            .unwrap();
        assert_eq!(tracker.sessions.load(Ordering::SeqCst), 2);
        assert_eq!(progress, vec![0.2, 0.4, 0.6, 0.8, 1.0]);

        let results = experiment.results(&tracker, &sequence).unwrap();
        assert!(Trajectory::exists(results.as_ref(), "ball_005"));
    }

    #[test]
    fn test_early_stop_after_identical_runs() {
        let experiment = UnsupervisedExperiment::new(
            core(),
            UnsupervisedOptions {
                repetitions: 5,
                early_stop: true,
            },
        )
        .unwrap();
        let tracker = Static::new(&[]);
        let sequence = sequence(2);

        experiment.execute(&tracker, &sequence, false, None).unwrap();

        let results = experiment.results(&tracker, &sequence).unwrap();
        assert!(Trajectory::exists(results.as_ref(), "ball_003"));
        assert!(!Trajectory::exists(results.as_ref(), "ball_004"));
        assert!(experiment.scan(&tracker, &sequence).unwrap().complete);
    }

    #[test]
    fn test_scan_incomplete() {
        let experiment = UnsupervisedExperiment::new(core(), UnsupervisedOptions::default()).unwrap();
        let report = experiment.scan(&Static::new(&[]), &sequence(2)).unwrap();
        assert!(!report.complete);
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_supervised_reinitializes_after_failure() {
        let experiment = SupervisedExperiment::new(
            core(),
            SupervisedOptions {
                skip_initialize: 2,
                ..SupervisedOptions::default()
            },
        )
        .unwrap();
        let tracker = Static::new(&[2]);
        let sequence = sequence(7);

        experiment.execute(&tracker, &sequence, false, None).unwrap();

        let results = experiment.results(&tracker, &sequence).unwrap();
        let trajectory = Trajectory::read(results.as_ref(), "ball_001").unwrap();
        let regions = trajectory.regions();
        assert!(regions[0].is_code(INITIALIZATION));
        assert!(!regions[1].is_special());
        assert!(regions[2].is_code(FAILURE));
        assert!(regions[3].is_code(UNKNOWN));
        assert!(regions[4].is_code(INITIALIZATION));
        assert!(!regions[5].is_special());
        assert!(!regions[6].is_special());
    }

    #[test]
    fn test_supervised_skips_tagged_frames() {
        let experiment = SupervisedExperiment::new(
            core(),
            SupervisedOptions {
                skip_tags: vec!["occlusion".to_string()],
                ..SupervisedOptions::default()
            },
        )
        .unwrap();
        let tracker = Static::new(&[1]);
        let sequence = Sequence::builder("ball")
            .frames(5, &Region::rectangle(0.0, 0.0, 10.0, 10.0))
            .tag(2, "occlusion")
            .tag(3, "occlusion")
            .build();

        experiment.execute(&tracker, &sequence, false, None).unwrap();

        let results = experiment.results(&tracker, &sequence).unwrap();
        let trajectory = Trajectory::read(results.as_ref(), "ball_001").unwrap();
        assert!(trajectory.region(1).unwrap().is_code(FAILURE));
        assert!(trajectory.region(2).unwrap().is_code(UNKNOWN));
        assert!(trajectory.region(3).unwrap().is_code(UNKNOWN));
        assert!(trajectory.region(4).unwrap().is_code(INITIALIZATION));
    }

    #[test]
    fn test_invalid_options() {
        assert!(UnsupervisedExperiment::new(
            core(),
            UnsupervisedOptions {
                repetitions: 0,
                early_stop: true
            }
        )
        .is_err());
        assert!(SupervisedExperiment::new(
            core(),
            SupervisedOptions {
                skip_initialize: 0,
                ..SupervisedOptions::default()
            }
        )
        .is_err());
        assert!(SupervisedExperiment::new(
            core(),
            SupervisedOptions {
                failure_overlap: 1.5,
                ..SupervisedOptions::default()
            }
        )
        .is_err());
    }
}
