//! Trajectory - per-frame tracker output of one tracking run
//!
//! Stored in a [`Results`] namespace as `<name>.txt` (one region per line)
//! plus one `<name>_<property>.value` file per reported property.

use std::collections::{BTreeMap, BTreeSet};

use crate::region::{Region, UNKNOWN};
use crate::storage::Results;
use crate::tracker::Properties;
use crate::{Error, Result};

/// Regions and properties for every frame of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    regions: Vec<Region>,
    properties: Vec<Properties>,
}

impl Trajectory {
    /// Trajectory of `length` frames, all [`UNKNOWN`].
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            regions: vec![Region::Special(UNKNOWN); length],
            properties: vec![Properties::new(); length],
        }
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the trajectory has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Set region and properties of a frame.
    ///
    /// # Errors
    ///
    /// Returns `Error::Other` if `frame` is out of range.
    pub fn set(&mut self, frame: usize, region: Region, properties: Properties) -> Result<()> {
        if frame >= self.regions.len() {
            return Err(Error::Other(format!(
                "frame {frame} out of range for trajectory of {} frames",
                self.regions.len()
            )));
        }
        self.regions[frame] = region;
        self.properties[frame] = properties;
        Ok(())
    }

    /// Region of a frame.
    #[must_use]
    pub fn region(&self, frame: usize) -> Option<&Region> {
        self.regions.get(frame)
    }

    /// All regions.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Properties of a frame.
    #[must_use]
    pub fn properties(&self, frame: usize) -> Option<&Properties> {
        self.properties.get(frame)
    }

    /// Region-wise equality (properties such as timing are ignored).
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.regions == other.regions
    }

    /// Whether a trajectory called `name` is stored.
    #[must_use]
    pub fn exists(results: &dyn Results, name: &str) -> bool {
        results.exists(&format!("{name}.txt"))
    }

    /// Entry names that make up the stored trajectory `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the results cannot be listed.
    pub fn gather(results: &dyn Results, name: &str) -> Result<Vec<String>> {
        let regions = format!("{name}.txt");
        if !results.exists(&regions) {
            return Ok(Vec::new());
        }
        let property_prefix = format!("{name}_");
        let mut files = vec![regions];
        files.extend(
            results
                .find(&property_prefix)?
                .into_iter()
                .filter(|f| f.ends_with(".value")),
        );
        Ok(files)
    }

    /// Write the trajectory as `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry cannot be written.
    pub fn write(&self, results: &dyn Results, name: &str) -> Result<()> {
        let mut regions = String::new();
        for region in &self.regions {
            regions.push_str(&region.to_string());
            regions.push('\n');
        }
        results.write(&format!("{name}.txt"), &regions)?;

        let keys: BTreeSet<&String> = self.properties.iter().flat_map(BTreeMap::keys).collect();
        for key in keys {
            let mut values = String::new();
            for properties in &self.properties {
                if let Some(value) = properties.get(key) {
                    values.push_str(&value.to_string());
                }
                values.push('\n');
            }
            results.write(&format!("{name}_{key}.value"), &values)?;
        }
        Ok(())
    }

    /// Read the stored trajectory `name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if missing and `Error::ParseError` if malformed.
    pub fn read(results: &dyn Results, name: &str) -> Result<Self> {
        let regions = results
            .read(&format!("{name}.txt"))?
            .lines()
            .map(str::parse::<Region>)
            .collect::<Result<Vec<_>>>()?;
        let mut trajectory = Self {
            properties: vec![Properties::new(); regions.len()],
            regions,
        };

        let property_prefix = format!("{name}_");
        for file in Self::gather(results, name)?.into_iter().skip(1) {
            let Some(key) = file
                .strip_prefix(&property_prefix)
                .and_then(|f| f.strip_suffix(".value"))
            else {
                continue;
            };
            let content = results.read(&file)?;
            for (frame, line) in content.lines().enumerate().take(trajectory.len()) {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let value = line.parse::<f64>().map_err(|e| {
                    Error::ParseError(format!("{file} line {}: {e}", frame + 1))
                })?;
                trajectory.properties[frame].insert(key.to_string(), value);
            }
        }

        Ok(trajectory)
    }
}
