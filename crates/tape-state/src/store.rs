//! Storage trait definition for session tapes.
//!
//! `TapeStore` is async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::entry::{LogEntry, NewEntry};
use crate::error::StoreError;

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Append-only tape of entries for one workspace.
///
/// Guarantees:
/// - `append` assigns ids that increase by exactly one per call, starting at 1.
/// - An entry is either fully stored and visible to later reads, or the
///   append fails; partial entries are never observable.
/// - `read_all` returns entries in ascending id order and preserves kinds it
///   does not recognise.
/// - Entries are never edited or removed, except by `archive_and_clear`,
///   which moves the whole tape aside and starts a new empty one.
///
/// A store is meant to be owned by a single session. Appends from tasks in the
/// same process are serialized; concurrent writers from other processes are
/// not supported.
#[async_trait]
pub trait TapeStore: Send + Sync {
    /// Persist an entry and return its assigned sequence id.
    async fn append(&self, entry: NewEntry) -> StoreResult<u64>;

    /// Read every entry on the tape, ordered by id.
    async fn read_all(&self) -> StoreResult<Vec<LogEntry>>;

    /// Move the current tape aside and start a new empty one.
    ///
    /// Returns the archive location, or `None` if the tape was empty.
    async fn archive_and_clear(&self) -> StoreResult<Option<PathBuf>>;

    /// Human-readable tape name.
    fn name(&self) -> &str;
}
