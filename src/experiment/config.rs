//! Experiment configuration
//!
//! Deserializes the per-experiment block of a benchmark stack, e.g.
//!
//! ```json
//! {
//!     "type": "supervised",
//!     "repetitions": 15,
//!     "skip_initialize": 5,
//!     "realtime": {"grace": 3}
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    Experiment, ExperimentCore, MultiStartExperiment, MultiStartOptions, RealtimeConfig,
    SupervisedExperiment, SupervisedOptions, UnsupervisedExperiment, UnsupervisedOptions,
};
use crate::storage::Storage;
use crate::transform::Transformer;
use crate::Result;

/// Protocol selected by the `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Protocol {
    /// See [`UnsupervisedExperiment`]
    Unsupervised(UnsupervisedOptions),
    /// See [`SupervisedExperiment`]
    Supervised(SupervisedOptions),
    /// See [`MultiStartExperiment`]
    Multistart(MultiStartOptions),
}

/// Configuration of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Protocol and its parameters
    #[serde(flatten)]
    pub protocol: Protocol,
    /// Real-time pacing; absent means no pacing
    #[serde(default)]
    pub realtime: Option<RealtimeConfig>,
    /// Reserved
    #[serde(default)]
    pub noise: Option<serde_json::Value>,
    /// Reserved
    #[serde(default)]
    pub inject: Option<serde_json::Value>,
}

impl ExperimentConfig {
    /// Parse a JSON configuration block.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` for malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Instantiate the configured protocol.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any parameter is out of range.
    pub fn build(
        self,
        identifier: impl Into<String>,
        storage: Arc<dyn Storage>,
        transformers: Vec<Box<dyn Transformer>>,
    ) -> Result<Box<dyn Experiment>> {
        let core = ExperimentCore::builder(identifier, storage)
            .transformers(transformers)
            .realtime(self.realtime)
            .noise(self.noise)
            .inject(self.inject)
            .build()?;

        let experiment: Box<dyn Experiment> = match self.protocol {
            Protocol::Unsupervised(options) => Box::new(UnsupervisedExperiment::new(core, options)?),
            Protocol::Supervised(options) => Box::new(SupervisedExperiment::new(core, options)?),
            Protocol::Multistart(options) => Box::new(MultiStartExperiment::new(core, options)?),
        };
        Ok(experiment)
    }
}
