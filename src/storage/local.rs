//! Directory-tree storage backend.
//!
//! Layout:
//!
//! ```text
//! <root>/<tracker>/<experiment>/<sequence>/<entry>
//! <root>/logs/<identifier>_<timestamp>.log
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{LogHandle, Results, Storage};
use crate::sequence::Sequence;
use crate::tracker::Tracker;
use crate::{Error, Result};

/// Storage rooted at a workspace directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for LocalStorage {
    fn results(
        &self,
        tracker: &dyn Tracker,
        experiment: &str,
        sequence: &Sequence,
    ) -> Result<Box<dyn Results>> {
        let root = self
            .root
            .join(tracker.identifier())
            .join(experiment)
            .join(sequence.name());
        Ok(Box::new(LocalResults { root }))
    }

    fn open_log(&self, identifier: &str) -> Result<LogHandle> {
        let directory = self.root.join("logs");
        fs::create_dir_all(&directory)?;

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.6f");
        let path = directory.join(format!("{identifier}_{timestamp}.log"));
        let file = File::create(&path).map_err(|e| {
            Error::Storage(format!("Failed to create log {}: {e}", path.display()))
        })?;

        Ok(LogHandle::new(
            path.display().to_string(),
            Box::new(BufWriter::new(file)),
        ))
    }
}

/// Results stored as files in one directory.
#[derive(Debug, Clone)]
pub struct LocalResults {
    root: PathBuf,
}

impl LocalResults {
    /// Directory holding the entries.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Results for LocalResults {
    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn read(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.root.join(name), content)?;
        Ok(())
    }

    fn find(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::tracker::TrackerRuntime;
    use std::io::Write;

    struct Named(&'static str);

    impl Tracker for Named {
        fn identifier(&self) -> &str {
            self.0
        }

        fn runtime(&self) -> Result<Box<dyn TrackerRuntime>> {
            Err(Error::tracker(self.0, "not runnable"))
        }
    }

    #[test]
    fn test_results_layout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let sequence = Sequence::builder("car")
            .frames(1, &Region::rectangle(0.0, 0.0, 1.0, 1.0))
            .build();

        let results = storage.results(&Named("ncc"), "baseline", &sequence).unwrap();
        assert!(!results.exists("car_001.txt"));
        assert!(results.find("car").unwrap().is_empty());

        results.write("car_001.txt", "1\n").unwrap();
        results.write("car_001_time.value", "0.1\n").unwrap();

        assert!(dir.path().join("ncc/baseline/car/car_001.txt").is_file());
        assert_eq!(results.read("car_001.txt").unwrap(), "1\n");
        assert_eq!(
            results.find("car_001").unwrap(),
            vec!["car_001.txt".to_string(), "car_001_time.value".to_string()]
        );
    }

    #[test]
    fn test_log_is_flushed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let name = {
            let mut log = storage.open_log("ncc").unwrap();
            log.write_all(b"segfault").unwrap();
            log.name().to_string()
        };

        assert!(name.contains("ncc_"));
        assert_eq!(fs::read_to_string(name).unwrap(), "segfault");
    }
}
