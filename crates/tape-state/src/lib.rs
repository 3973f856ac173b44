//! Tape-State: append-only tape storage for tapezone
//!
//! This crate provides the persistence layer for session tapes. A tape is an
//! ordered, ever-growing sequence of [`LogEntry`] records for one workspace,
//! stored as one JSON object per line.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append ordering, crash tolerance, and exclusive writes.
//!
//! ## Key Components
//!
//! - `TapeStore`: append / read_all / archive_and_clear contract
//! - `FileTapeStore`: JSONL file backend with an OS advisory lock
//! - `MemoryTapeStore`: in-memory fake for tests

mod error;
pub mod entry;
pub mod fakes;
pub mod file_store;
pub mod paths;
pub mod store;

pub use entry::{EntryKind, LogEntry, NewEntry};
pub use error::StoreError;
pub use fakes::MemoryTapeStore;
pub use file_store::FileTapeStore;
pub use paths::{resolve_tape_paths, workspace_hash, TapePaths, DEFAULT_TAPE_NAME};
pub use store::{StoreResult, TapeStore};
