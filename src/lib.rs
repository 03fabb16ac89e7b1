//! # trackbench: visual object tracking evaluation core
//!
//! **Version**: 0.1.0
//!
//! trackbench drives a tracker through the sequences of a benchmark under an
//! evaluation protocol and stores the resulting trajectories. Scoring and
//! report generation live elsewhere; this crate owns the execution side.
//!
//! ## Building blocks
//!
//! - **Transform pipeline**: ordered [`transform::Transformer`]s adapt each sequence before it is run
//! - **Real-time pacing**: [`experiment::RealtimeConfig`] wraps a tracker runtime in a frame budget
//! - **Protocols**: unsupervised, supervised (reset on failure) and multi-start experiments
//! - **Run loop**: [`experiment::run_experiment`] with fail-fast or persist-on-failure policy
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trackbench::experiment::{Experiment, ExperimentConfig};
//! use trackbench::storage::MemoryStorage;
//!
//! let config = ExperimentConfig::from_json(r#"{"type": "unsupervised", "repetitions": 1}"#)?;
//! let experiment = config.build("baseline", Arc::new(MemoryStorage::new()), Vec::new())?;
//! assert_eq!(experiment.identifier(), "baseline");
//! # Ok::<(), trackbench::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod experiment;
pub mod logging;
pub mod region;
pub mod sequence;
pub mod storage;
pub mod tracker;
pub mod trajectory;
pub mod transform;

pub use error::{Error, Result, TrackerFailure};
