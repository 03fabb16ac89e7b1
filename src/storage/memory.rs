//! In-memory storage backend using `DashMap`.
//!
//! Data is lost when the storage is dropped. Keys mirror the
//! [`LocalStorage`](super::LocalStorage) layout so the two are
//! interchangeable in tests.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::{LogHandle, Results, Storage};
use crate::sequence::Sequence;
use crate::tracker::Tracker;
use crate::{Error, Result};

/// Thread-safe in-memory storage.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
    logs: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry by full key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// All keys starting with `prefix`, sorted.
    #[must_use]
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored entries (results and logs).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn results(
        &self,
        tracker: &dyn Tracker,
        experiment: &str,
        sequence: &Sequence,
    ) -> Result<Box<dyn Results>> {
        Ok(Box::new(MemoryResults {
            prefix: format!("{}/{experiment}/{}/", tracker.identifier(), sequence.name()),
            entries: Arc::clone(&self.entries),
        }))
    }

    fn open_log(&self, identifier: &str) -> Result<LogHandle> {
        // Counter instead of a timestamp keeps keys unique within one run
        let serial = self.logs.fetch_add(1, Ordering::Relaxed);
        let key = format!("logs/{identifier}_{serial:04}.log");
        let writer = MemoryLogWriter {
            key: key.clone(),
            buffer: Vec::new(),
            entries: Arc::clone(&self.entries),
        };
        Ok(LogHandle::new(key, Box::new(writer)))
    }
}

/// Results namespace inside a [`MemoryStorage`].
pub struct MemoryResults {
    prefix: String,
    entries: Arc<DashMap<String, String>>,
}

impl Results for MemoryResults {
    fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&format!("{}{name}", self.prefix))
    }

    fn read(&self, name: &str) -> Result<String> {
        let key = format!("{}{name}", self.prefix);
        self.entries
            .get(&key)
            .map(|v| v.value().clone())
            .ok_or_else(|| Error::Storage(format!("No such entry: {key}")))
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        self.entries
            .insert(format!("{}{name}", self.prefix), content.to_string());
        Ok(())
    }

    fn find(&self, prefix: &str) -> Result<Vec<String>> {
        let full = format!("{}{prefix}", self.prefix);
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(&full))
            .filter_map(|entry| entry.key().strip_prefix(&self.prefix).map(str::to_string))
            .filter(|name| !name.contains('/'))
            .collect();
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        format!("memory://{}", self.prefix)
    }
}

struct MemoryLogWriter {
    key: String,
    buffer: Vec<u8>,
    entries: Arc<DashMap<String, String>>,
}

impl Write for MemoryLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.entries.insert(
            self.key.clone(),
            String::from_utf8_lossy(&self.buffer).into_owned(),
        );
        Ok(())
    }
}
