//! Sequence transform pipeline
//!
//! Transformers are pure sequence-to-sequence adapters applied in list order
//! before a sequence is handed to an experiment. Errors are propagated as-is.

use crate::sequence::Sequence;
use crate::Result;

/// A pure mapping from one sequence to another.
pub trait Transformer: Send + Sync {
    /// Produce the transformed sequence.
    ///
    /// # Errors
    ///
    /// Implementation defined; usually `Error::Transform` or `Error::Sequence`.
    fn transform(&self, sequence: Sequence) -> Result<Sequence>;
}

impl<F> Transformer for F
where
    F: Fn(Sequence) -> Result<Sequence> + Send + Sync,
{
    fn transform(&self, sequence: Sequence) -> Result<Sequence> {
        self(sequence)
    }
}

/// Apply `transformers` left to right; identity for an empty list.
///
/// # Errors
///
/// Returns the first transformer error, unchanged.
pub fn apply(transformers: &[Box<dyn Transformer>], sequence: Sequence) -> Result<Sequence> {
    transformers
        .iter()
        .try_fold(sequence, |sequence, transformer| transformer.transform(sequence))
}

/// Keeps every `step`-th frame, starting from the first.
///
/// Useful for simulating low frame-rate capture; the declared `fps`
/// metadata is divided accordingly when present.
#[derive(Debug, Clone, Copy)]
pub struct Downsample {
    step: usize,
}

impl Downsample {
    /// Create a downsampler; `step` of 1 is the identity.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `step` is zero.
    pub fn new(step: usize) -> Result<Self> {
        if step == 0 {
            return Err(crate::Error::Config(
                "downsample step must be at least 1".to_string(),
            ));
        }
        Ok(Self { step })
    }
}

impl Transformer for Downsample {
    fn transform(&self, sequence: Sequence) -> Result<Sequence> {
        if self.step == 1 {
            return Ok(sequence);
        }
        let indices: Vec<usize> = (0..sequence.length()).step_by(self.step).collect();
        let remapped = sequence.remap(&indices)?;

        // Non-numeric fps is left for the realtime decision to reject
        match sequence.metadata_number("fps") {
            #[allow(clippy::cast_precision_loss)]
            Ok(Some(fps)) => Ok(remapped.with_metadata("fps", fps / self.step as f64)),
            Ok(None) | Err(_) => Ok(remapped),
        }
    }
}
