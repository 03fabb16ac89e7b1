//! Progress reporting for the run loop

use tracing::{debug, info};

/// Sink for absolute progress positions, measured in sequences.
pub trait ProgressBar {
    /// Begin a new batch of `total` sequences.
    fn start(&mut self, description: &str, total: usize);

    /// Move to an absolute position in `[0, total]`.
    fn update_absolute(&mut self, position: f64);

    /// Batch finished (or aborted).
    fn finish(&mut self) {}
}

/// Progress bar that reports through `tracing`.
///
/// Fractional updates are emitted at debug level whenever they cross a whole
/// percent of the batch; whole-sequence updates at info level.
#[derive(Debug, Clone, Default)]
pub struct LogProgress {
    description: String,
    total: usize,
    position: f64,
    percent: Option<u64>,
}

impl LogProgress {
    /// Create an idle progress bar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> f64 {
        self.position
    }

    /// Number of sequences in the batch.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        (self.position / self.total as f64 * 100.0).floor() as u64
    }
}

impl ProgressBar for LogProgress {
    fn start(&mut self, description: &str, total: usize) {
        self.description = description.to_string();
        self.total = total;
        self.position = 0.0;
        self.percent = None;
        info!(task = %self.description, total, "Starting");
    }

    fn update_absolute(&mut self, position: f64) {
        self.position = position;
        let percent = self.percent();
        if self.percent == Some(percent) {
            return;
        }
        self.percent = Some(percent);

        if position.fract() == 0.0 {
            info!(
                task = %self.description,
                position,
                total = self.total,
                "{percent}%"
            );
        } else {
            debug!(
                task = %self.description,
                position,
                total = self.total,
                "{percent}%"
            );
        }
    }

    fn finish(&mut self) {
        info!(task = %self.description, position = self.position, total = self.total, "Finished");
    }
}

/// Maps per-sequence progress onto a batch-level bar.
///
/// A fractional value `p` reported while processing sequence `j + 1` is shown
/// as `j + clamp(p, 0, 1)`; [`push`](Self::push) then moves to `j + 1`.
pub struct EvaluationProgress<'a, B: ProgressBar + ?Sized> {
    bar: &'a mut B,
    finished: usize,
}

impl<'a, B: ProgressBar + ?Sized> EvaluationProgress<'a, B> {
    /// Start tracking `total` sequences on `bar`.
    pub fn new(bar: &'a mut B, description: &str, total: usize) -> Self {
        bar.start(description, total);
        Self { bar, finished: 0 }
    }

    /// Report in-sequence progress.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&mut self, progress: f64) {
        // NaN clamps to 0
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        self.bar.update_absolute(self.finished as f64 + progress);
    }

    /// Mark the current sequence as done.
    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self) {
        self.finished += 1;
        self.bar.update_absolute(self.finished as f64);
    }

    /// Sequences completed so far.
    #[must_use]
    pub const fn finished(&self) -> usize {
        self.finished
    }

    /// Close the bar.
    pub fn finish(self) {
        self.bar.finish();
    }
}
