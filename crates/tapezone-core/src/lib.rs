//! Tapezone Core Library
//!
//! Anchor lookups, versioned zones, and the tape-native memory zone built on
//! top of the `tape-state` append-only store.

pub mod anchors;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod obs;
pub mod service;
pub mod telemetry;
pub mod zone;

pub use anchors::{
    between, find_anchor_by_name, find_highest_version_seal, find_matching_open, AnchorSummary,
    Direction,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TapeConfig;
pub use context::{render_memory_block, ContextBudget, MEMORY_USAGE_HINT};
pub use error::{Result, ZoneError};
pub use memory::{DailyNote, MemorySnapshot, MemorySummary, MemoryZone, RecallQuery};
pub use obs::SessionSpan;
pub use service::{ResetOutcome, TapeInfo, TapeService, BOOTSTRAP_ANCHOR};
pub use telemetry::init_tracing;
pub use zone::{locate, VersionedZone, ZoneRegion, ZoneSpec, DEFAULT_VERSION_SOFT_CAP};

pub use tape_state::{EntryKind, FileTapeStore, LogEntry, MemoryTapeStore, NewEntry, TapeStore};

/// Tapezone version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
