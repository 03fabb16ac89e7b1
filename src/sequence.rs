//! Sequence value type
//!
//! A [`Sequence`] is an immutable evaluation unit: frames, groundtruth,
//! per-frame tags and values, plus free-form metadata. Loading sequences from
//! a dataset is the caller's concern; this module only models the data the
//! experiment core reads.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::region::Region;
use crate::{Error, Result};

/// One frame of a sequence: channel name to image location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    index: usize,
    channels: BTreeMap<String, PathBuf>,
}

impl Frame {
    /// Create a frame with no channels.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            channels: BTreeMap::new(),
        }
    }

    /// Add an image channel (e.g. `color`, `depth`, `ir`).
    #[must_use]
    pub fn with_channel(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.channels.insert(name.into(), path.into());
        self
    }

    /// Index of the frame in its original sequence.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Location of a channel image.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&PathBuf> {
        self.channels.get(name)
    }
}

/// An ordered set of frames with groundtruth and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    name: String,
    frames: Vec<Frame>,
    groundtruth: Vec<Region>,
    tags: Vec<Vec<String>>,
    values: Vec<BTreeMap<String, f64>>,
    metadata: serde_json::Map<String, serde_json::Value>,
    size: Option<(u32, u32)>,
}

impl Sequence {
    /// Create a builder for a sequence.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SequenceBuilder {
        SequenceBuilder::new(name)
    }

    /// Sequence name, used to key results.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of frames.
    #[must_use]
    pub fn length(&self) -> usize {
        self.frames.len()
    }

    /// Image size (width, height), if known.
    #[must_use]
    pub const fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Frame at `index`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sequence` if the index is out of range.
    pub fn frame(&self, index: usize) -> Result<&Frame> {
        self.frames.get(index).ok_or_else(|| self.out_of_range(index))
    }

    /// Groundtruth region at `index`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sequence` if the index is out of range.
    pub fn groundtruth(&self, index: usize) -> Result<&Region> {
        self.groundtruth
            .get(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Tags of the frame at `index` (empty when untagged).
    #[must_use]
    pub fn tags(&self, index: usize) -> &[String] {
        self.tags.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    /// Per-frame numeric values at `index` (e.g. `anchor`).
    #[must_use]
    pub fn values(&self, index: usize) -> Option<&BTreeMap<String, f64>> {
        self.values.get(index)
    }

    /// Metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Numeric metadata entry, accepting numbers and numeric strings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sequence` if the entry exists but is not numeric.
    pub fn metadata_number(&self, key: &str) -> Result<Option<f64>> {
        let Some(value) = self.metadata.get(key) else {
            return Ok(None);
        };
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| {
                Error::Sequence(format!(
                    "sequence {} declares non-numeric {key} {value}",
                    self.name
                ))
            })
    }

    /// Return this sequence with a metadata entry replaced.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Build a new sequence whose frames are the given indices of this one.
    ///
    /// Groundtruth, tags and values follow the frames. Metadata and size are
    /// shared.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sequence` if any index is out of range.
    pub fn remap(&self, indices: &[usize]) -> Result<Self> {
        let mut builder = Self::builder(self.name.clone());
        builder.metadata = self.metadata.clone();
        builder.size = self.size;

        for &index in indices {
            builder = builder.frame(
                self.frame(index)?.clone(),
                self.groundtruth(index)?.clone(),
            );
            builder.tags.push(self.tags(index).to_vec());
            builder
                .values
                .push(self.values(index).cloned().unwrap_or_default());
        }

        Ok(builder.build())
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::Sequence(format!(
            "frame {index} out of range for sequence {} ({} frames)",
            self.name,
            self.frames.len()
        ))
    }
}

/// Builder for `Sequence`.
#[derive(Debug)]
pub struct SequenceBuilder {
    name: String,
    frames: Vec<Frame>,
    groundtruth: Vec<Region>,
    tags: Vec<Vec<String>>,
    values: Vec<BTreeMap<String, f64>>,
    metadata: serde_json::Map<String, serde_json::Value>,
    size: Option<(u32, u32)>,
}

impl SequenceBuilder {
    /// Create a new builder for an empty sequence.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
            groundtruth: Vec::new(),
            tags: Vec::new(),
            values: Vec::new(),
            metadata: serde_json::Map::new(),
            size: None,
        }
    }

    /// Append a frame with its groundtruth.
    #[must_use]
    pub fn frame(mut self, frame: Frame, groundtruth: Region) -> Self {
        self.frames.push(frame);
        self.groundtruth.push(groundtruth);
        self
    }

    /// Append `count` channel-less frames sharing the same groundtruth.
    #[must_use]
    pub fn frames(mut self, count: usize, groundtruth: &Region) -> Self {
        for _ in 0..count {
            let index = self.frames.len();
            self = self.frame(Frame::new(index), groundtruth.clone());
        }
        self
    }

    /// Set tags for frame `index`.
    #[must_use]
    pub fn tag(mut self, index: usize, tag: impl Into<String>) -> Self {
        if self.tags.len() <= index {
            self.tags.resize(index + 1, Vec::new());
        }
        self.tags[index].push(tag.into());
        self
    }

    /// Set a numeric value for frame `index`.
    #[must_use]
    pub fn value(mut self, index: usize, key: impl Into<String>, value: f64) -> Self {
        if self.values.len() <= index {
            self.values.resize(index + 1, BTreeMap::new());
        }
        self.values[index].insert(key.into(), value);
        self
    }

    /// Set a metadata entry (e.g. `fps`).
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the image size.
    #[must_use]
    pub const fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Build the `Sequence`.
    #[must_use]
    pub fn build(self) -> Sequence {
        Sequence {
            name: self.name,
            frames: self.frames,
            groundtruth: self.groundtruth,
            tags: self.tags,
            values: self.values,
            metadata: self.metadata,
            size: self.size,
        }
    }
}
