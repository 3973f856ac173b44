//! In-memory fake for the tape storage trait (testing only)
//!
//! `MemoryTapeStore` satisfies the `TapeStore` contract without touching the
//! filesystem. It can also simulate an unwritable medium.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::entry::{LogEntry, NewEntry};
use crate::error::StoreError;
use crate::store::{StoreResult, TapeStore};

#[derive(Debug, Default)]
struct TapeState {
    entries: Vec<LogEntry>,
    archives: Vec<Vec<LogEntry>>,
}

/// In-memory tape backed by a `Vec<LogEntry>`.
#[derive(Debug, Default)]
pub struct MemoryTapeStore {
    state: Mutex<TapeState>,
    fail_appends: AtomicBool,
}

impl MemoryTapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tape with pre-built entries (ids are kept as given).
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().entries = entries;
        store
    }

    /// Make every subsequent append fail with `StoreError::Unavailable`.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of entries currently on the tape.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tapes moved aside by `archive_and_clear`, oldest first.
    pub fn archives(&self) -> Vec<Vec<LogEntry>> {
        self.state.lock().unwrap().archives.clone()
    }
}

#[async_trait]
impl TapeStore for MemoryTapeStore {
    async fn append(&self, entry: NewEntry) -> StoreResult<u64> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "simulated unwritable tape",
            )));
        }
        let mut state = self.state.lock().unwrap();
        let id = state.entries.last().map(|e| e.id).unwrap_or(0) + 1;
        state.entries.push(LogEntry::from_new(id, entry));
        Ok(id)
    }

    async fn read_all(&self) -> StoreResult<Vec<LogEntry>> {
        Ok(self.state.lock().unwrap().entries.clone())
    }

    async fn archive_and_clear(&self) -> StoreResult<Option<PathBuf>> {
        let mut state = self.state.lock().unwrap();
        if state.entries.is_empty() {
            return Ok(None);
        }
        let archived = std::mem::take(&mut state.entries);
        state.archives.push(archived);
        Ok(Some(PathBuf::from(format!(
            "memory://archive/{}",
            state.archives.len()
        ))))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
