//! Tape-native memory zone.
//!
//! Memory lives as a versioned region of the tape bounded by `memory/open`
//! and `memory/seal` anchors. Each write appends a new pair, so the tape
//! stays append-only while the current memory is always the sealed pair with
//! the highest version.

pub mod snapshot;
pub mod zone;

pub use snapshot::{DailyNote, MemorySnapshot};
pub use zone::{
    MemorySummary, MemoryZone, RecallQuery, DEFAULT_DAILY_RETENTION_DAYS, MEMORY_DAILY_EVENT,
    MEMORY_LONG_TERM_EVENT, MEMORY_OPEN_ANCHOR, MEMORY_SEAL_ANCHOR, MEMORY_ZONE,
    RECENT_NOTE_DAYS,
};
