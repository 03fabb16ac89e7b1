//! Result and log storage
//!
//! Experiments never touch the filesystem directly. Results are namespaced
//! by (tracker, experiment, sequence) and handed out as [`Results`] handles;
//! diagnostic logs are opened as scoped [`LogHandle`]s.
//!
//! ## Backends
//!
//! - [`LocalStorage`]: plain directory tree, one file per result entry
//! - [`MemoryStorage`]: `DashMap`-backed, for tests and dry runs

mod local;
mod memory;

pub use local::{LocalResults, LocalStorage};
pub use memory::{MemoryResults, MemoryStorage};

use std::fmt;
use std::io::{self, Write};

use tracing::warn;

use crate::sequence::Sequence;
use crate::tracker::Tracker;
use crate::Result;

/// Result sink for one (tracker, experiment, sequence) triple.
pub trait Results: Send + Sync {
    /// Whether an entry exists.
    fn exists(&self, name: &str) -> bool;

    /// Read an entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the entry is missing or unreadable.
    fn read(&self, name: &str) -> Result<String>;

    /// Create or overwrite an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    fn write(&self, name: &str, content: &str) -> Result<()>;

    /// Names of all entries starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be listed.
    fn find(&self, prefix: &str) -> Result<Vec<String>>;

    /// Human-readable location, for log messages.
    fn location(&self) -> String;
}

/// Storage backend shared by experiments.
pub trait Storage: Send + Sync {
    /// Results handle for the given triple. No caching is expected.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot provide the namespace.
    fn results(
        &self,
        tracker: &dyn Tracker,
        experiment: &str,
        sequence: &Sequence,
    ) -> Result<Box<dyn Results>>;

    /// Open a fresh log sink for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be created.
    fn open_log(&self, identifier: &str) -> Result<LogHandle>;
}

/// Writable log sink that is flushed when dropped.
///
/// Hold it in a block scope; the content is guaranteed to reach the backend
/// once the handle goes out of scope, on both normal and error paths.
pub struct LogHandle {
    name: String,
    writer: Box<dyn Write + Send>,
}

impl LogHandle {
    /// Wrap a writer under a display name.
    #[must_use]
    pub fn new(name: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            writer,
        }
    }

    /// Where the log ends up (file path or storage key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle").field("name", &self.name).finish()
    }
}

impl Write for LogHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(log = %self.name, error = %e, "Failed to flush log");
        }
    }
}
