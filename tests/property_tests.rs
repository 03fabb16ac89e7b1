//! Property-based tests for trackbench
//!
//! - Test pipeline and pacing invariants
//! - Test failure policy over arbitrary failure patterns
//! - Run with ProptestConfig::with_cases(100)

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use trackbench::experiment::{
    realtime_runtime, run_experiment, EvaluationProgress, Experiment, ExperimentCore,
    ProgressBar, ProgressCallback, RealtimeConfig, ScanReport,
};
use trackbench::region::{calculate_overlap, Region};
use trackbench::sequence::{Frame, Sequence};
use trackbench::storage::MemoryStorage;
use trackbench::tracker::{Tracker, TrackerOutput, TrackerRuntime};
use trackbench::transform::{apply, Downsample, Transformer};
use trackbench::{Error, Result};

// ============================================================================
// Fixtures
// ============================================================================

struct Plain;

struct PlainRuntime;

impl Tracker for Plain {
    fn identifier(&self) -> &str {
        "plain"
    }

    fn runtime(&self) -> Result<Box<dyn TrackerRuntime>> {
        Ok(Box::new(PlainRuntime))
    }
}

impl TrackerRuntime for PlainRuntime {
    fn tracker(&self) -> &str {
        "plain"
    }

    fn initialize(&mut self, _frame: &Frame, region: &Region) -> Result<TrackerOutput> {
        Ok(TrackerOutput::new(region.clone(), 0.0))
    }

    fn update(&mut self, _frame: &Frame) -> Result<TrackerOutput> {
        Ok(TrackerOutput::new(Region::Special(0), 0.0))
    }
}

/// Fails on the configured sequence indices, records every call.
struct Flaky {
    core: ExperimentCore,
    failing: BTreeSet<usize>,
    calls: Mutex<Vec<usize>>,
}

impl Experiment for Flaky {
    fn core(&self) -> &ExperimentCore {
        &self.core
    }

    fn execute(
        &self,
        tracker: &dyn Tracker,
        sequence: &Sequence,
        _force: bool,
        _callback: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        let index: usize = sequence
            .name()
            .parse()
            .map_err(|_| Error::Sequence(sequence.name().to_string()))?;
        self.calls.lock().unwrap().push(index);
        if self.failing.contains(&index) {
            return Err(Error::tracker(tracker.identifier(), "scripted failure"));
        }
        Ok(())
    }

    fn scan(&self, tracker: &dyn Tracker, sequence: &Sequence) -> Result<ScanReport> {
        Ok(ScanReport {
            complete: false,
            files: Vec::new(),
            results: self.results(tracker, sequence)?,
        })
    }
}

#[derive(Default)]
struct Positions(Vec<f64>);

impl ProgressBar for Positions {
    fn start(&mut self, _description: &str, _total: usize) {}

    fn update_absolute(&mut self, position: f64) {
        self.0.push(position);
    }
}

fn sequence(name: &str, frames: usize) -> Sequence {
    Sequence::builder(name)
        .frames(frames, &Region::rectangle(0.0, 0.0, 4.0, 4.0))
        .build()
}

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Batch size and the set of failing sequence indices
fn arb_failures() -> impl Strategy<Value = (usize, BTreeSet<usize>)> {
    proptest::collection::vec(proptest::bool::weighted(0.3), 0..12).prop_map(|flags| {
        let failing = flags
            .iter()
            .enumerate()
            .filter_map(|(i, &fails)| fails.then_some(i))
            .collect();
        (flags.len(), failing)
    })
}

fn arb_rectangle() -> impl Strategy<Value = Region> {
    (0.0f32..100.0, 0.0f32..100.0, 0.1f32..50.0, 0.1f32..50.0)
        .prop_map(|(x, y, w, h)| Region::rectangle(x, y, w, h))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the pipeline equals manual composition in list order
    #[test]
    fn prop_pipeline_composes_in_order(
        frames in 1usize..60,
        steps in proptest::collection::vec(1usize..5, 0..4),
    ) {
        let input = sequence("seq", frames);
        let pipeline: Vec<Box<dyn Transformer>> = steps
            .iter()
            .map(|&step| Box::new(Downsample::new(step).unwrap()) as Box<dyn Transformer>)
            .collect();

        let mut expected = input.clone();
        for transformer in &pipeline {
            expected = transformer.transform(expected).unwrap();
        }

        prop_assert_eq!(apply(&pipeline, input).unwrap(), expected);
    }

    /// Property: an empty pipeline is the identity
    #[test]
    fn prop_empty_pipeline_is_identity(frames in 0usize..40) {
        let input = sequence("seq", frames);
        prop_assert_eq!(apply(&[], input.clone()).unwrap(), input);
    }

    /// Property: the interval is 1/sequence fps if declared, else 1/configured fps
    #[test]
    fn prop_interval_follows_effective_fps(
        grace in 0i64..10,
        fps in 0.5f64..240.0,
        declared in proptest::option::of(0.5f64..240.0),
    ) {
        let config = RealtimeConfig::new(grace, fps);
        let mut input = sequence("seq", 1);
        if let Some(declared) = declared {
            input = input.with_metadata("fps", declared);
        }

        let runtime = realtime_runtime(Some(&config), &Plain, &input).unwrap();
        let (paced_grace, interval) = runtime.pacing().unwrap();

        prop_assert_eq!(i64::from(paced_grace), grace);
        let effective = declared.unwrap_or(fps);
        prop_assert!((interval - 1.0 / effective).abs() < 1e-12);
    }

    /// Property: negative grace or non-positive fps is always rejected
    #[test]
    fn prop_invalid_realtime_rejected(
        grace in -100i64..0,
        fps in -100.0f64..=0.0,
        declared in proptest::option::of(0.5f64..240.0),
    ) {
        let mut input = sequence("seq", 1);
        if let Some(declared) = declared {
            input = input.with_metadata("fps", declared);
        }

        let negative_grace = realtime_runtime(Some(&RealtimeConfig::new(grace, 20.0)), &Plain, &input);
        prop_assert!(matches!(negative_grace, Err(Error::Config(_))));

        let bad_fps = realtime_runtime(Some(&RealtimeConfig::new(0, fps)), &Plain, &input);
        prop_assert!(matches!(bad_fps, Err(Error::Config(_))));
    }

    /// Property: in-sequence progress stays within the current sequence's unit
    #[test]
    fn prop_progress_is_clamped(
        finished in 0usize..20,
        reports in proptest::collection::vec(-5.0f64..5.0, 1..10),
    ) {
        let mut bar = Positions::default();
        let mut progress = EvaluationProgress::new(&mut bar, "plain/prop", finished + 1);
        for _ in 0..finished {
            progress.push();
        }
        for &report in &reports {
            progress.report(report);
        }
        progress.finish();

        #[allow(clippy::cast_precision_loss)]
        let base = finished as f64;
        for &position in &bar.0[finished..] {
            prop_assert!(position >= base && position <= base + 1.0);
        }
    }

    /// Property: persist attempts everything once; abort stops at the first failure
    #[test]
    fn prop_failure_policy((count, failing) in arb_failures()) {
        let sequences: Vec<Sequence> = (0..count).map(|i| sequence(&i.to_string(), 2)).collect();

        for persist in [true, false] {
            let experiment = Flaky {
                core: ExperimentCore::builder("prop", Arc::new(MemoryStorage::new())).build().unwrap(),
                failing: failing.clone(),
                calls: Mutex::new(Vec::new()),
            };
            let result = run_experiment(&experiment, &Plain, &sequences, false, persist);
            let calls = experiment.calls.lock().unwrap().clone();

            match (persist, failing.first()) {
                (true, _) | (false, None) => {
                    let summary = result.unwrap();
                    prop_assert_eq!(calls, (0..count).collect::<Vec<_>>());
                    prop_assert_eq!(summary.attempted, count);
                    let failed: BTreeSet<usize> = summary
                        .failures
                        .iter()
                        .map(|f| f.sequence.parse().unwrap())
                        .collect();
                    prop_assert_eq!(&failed, &failing);
                }
                (false, Some(&first)) => {
                    prop_assert!(matches!(result, Err(Error::Tracker(_))));
                    prop_assert_eq!(calls, (0..=first).collect::<Vec<_>>());
                }
            }
        }
    }

    /// Property: overlap is symmetric, bounded, and 1 for identical regions
    #[test]
    fn prop_overlap_bounds(a in arb_rectangle(), b in arb_rectangle()) {
        let ab = calculate_overlap(&a, &b, None);
        let ba = calculate_overlap(&b, &a, None);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-6);
        prop_assert!((calculate_overlap(&a, &a, None) - 1.0).abs() < 1e-5);
    }
}
