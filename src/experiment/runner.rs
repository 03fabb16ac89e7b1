//! Run loop: one experiment, one tracker, a batch of sequences
//!
//! Sequences are processed strictly in order. A tracker failure is logged
//! (with the captured tracker output written to a log file when available)
//! and then either aborts the batch or is recorded and skipped, depending on
//! `persist`. Every other error aborts the batch.

use std::io::Write;

use tracing::{debug, error};

use super::progress::{EvaluationProgress, LogProgress, ProgressBar};
use super::Experiment;
use crate::error::TrackerFailure;
use crate::sequence::Sequence;
use crate::tracker::Tracker;
use crate::{Error, Result};

/// A tracker failure that was persisted through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFailure {
    /// Name of the (transformed) sequence
    pub sequence: String,
    /// The failure as raised by the experiment
    pub failure: TrackerFailure,
}

/// Outcome of a completed batch.
///
/// Only produced when the loop finishes; with `persist` the failures that
/// were skipped are listed here in addition to the error log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Sequences handed to `execute`
    pub attempted: usize,
    /// Tracker failures skipped because of `persist`
    pub failures: Vec<SequenceFailure>,
}

impl RunSummary {
    /// Whether every attempted sequence succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `experiment` for `tracker` over `sequences`, reporting progress through `tracing`.
///
/// # Errors
///
/// With `persist == false` the first tracker failure is returned. Non-tracker
/// errors are always returned.
pub fn run_experiment<E>(
    experiment: &E,
    tracker: &dyn Tracker,
    sequences: &[Sequence],
    force: bool,
    persist: bool,
) -> Result<RunSummary>
where
    E: Experiment + ?Sized,
{
    let mut bar = LogProgress::new();
    run_experiment_with_progress(experiment, tracker, sequences, force, persist, &mut bar)
}

/// [`run_experiment`] with a caller-provided progress bar.
///
/// # Errors
///
/// See [`run_experiment`].
pub fn run_experiment_with_progress<E, B>(
    experiment: &E,
    tracker: &dyn Tracker,
    sequences: &[Sequence],
    force: bool,
    persist: bool,
    bar: &mut B,
) -> Result<RunSummary>
where
    E: Experiment + ?Sized,
    B: ProgressBar + ?Sized,
{
    let description = format!("{}/{}", tracker.identifier(), experiment.identifier());
    let mut progress = EvaluationProgress::new(bar, &description, sequences.len());
    let mut summary = RunSummary::default();

    for sequence in sequences {
        let sequence = experiment.transform(sequence.clone())?;

        summary.attempted += 1;
        let outcome = {
            let mut report = |value: f64| progress.report(value);
            experiment.execute(tracker, &sequence, force, Some(&mut report))
        };

        match outcome {
            Ok(()) => {}
            Err(Error::Tracker(failure)) => {
                report_failure(experiment, tracker, &sequence, &failure)?;
                if !persist {
                    progress.finish();
                    return Err(Error::Tracker(failure));
                }
                summary.failures.push(SequenceFailure {
                    sequence: sequence.name().to_string(),
                    failure,
                });
            }
            Err(e) => return Err(e),
        }

        progress.push();
    }

    progress.finish();
    Ok(summary)
}

/// Log a tracker failure and store its captured output, if any.
fn report_failure<E>(
    experiment: &E,
    tracker: &dyn Tracker,
    sequence: &Sequence,
    failure: &TrackerFailure,
) -> Result<()>
where
    E: Experiment + ?Sized,
{
    error!(
        tracker = tracker.identifier(),
        experiment = experiment.identifier(),
        sequence = sequence.name(),
        "Tracker {} encountered an error: {}",
        failure.tracker(),
        failure.message()
    );
    debug!(?failure, "Tracker failure details");

    if let Some(output) = failure.log() {
        let mut log = experiment.log(tracker.identifier())?;
        log.write_all(output.as_bytes())?;
        log.flush()?;
        error!(
            tracker = tracker.identifier(),
            path = log.name(),
            "Tracker output written to file: {}",
            log.name()
        );
    }

    Ok(())
}
