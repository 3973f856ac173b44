//! Structured observability hooks for tape and zone lifecycle events.
//!
//! This module provides:
//! - Session-scoped tracing spans via `SessionSpan` RAII guard
//! - Emission functions for zone writes, corruption, pruning, and archives
//!
//! Events are emitted at `info!` level unless noted (filter via `RUST_LOG`).

use std::path::Path;

use tracing::{info, warn};

use crate::error::ZoneError;

/// RAII guard that enters a session-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = SessionSpan::enter("3f2a9c...");
/// // every zone event below is tagged with tape = "3f2a9c..."
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    pub fn enter(tape: &str) -> Self {
        let span = tracing::info_span!("tapezone.session", tape = %tape);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a version pair was sealed.
pub fn emit_zone_written(zone: &str, version: u64, events: usize) {
    info!(event = "zone.written", zone = %zone, version = version, events = events);
}

/// Emit event: a zone pair could not be used (warning level).
pub fn emit_zone_corrupt(error: &ZoneError) {
    warn!(event = "zone.corrupt", error = %error);
}

/// Emit event: a zone version passed its soft cap (warning level).
pub fn emit_version_soft_cap(zone: &str, version: u64, soft_cap: u64) {
    warn!(
        event = "zone.version_soft_cap",
        zone = %zone,
        version = version,
        soft_cap = soft_cap,
        "zone version exceeds soft cap; consider archiving the tape"
    );
}

/// Emit event: a memory mutation completed.
pub fn emit_memory_updated(action: &str, version: u64) {
    info!(event = "memory.updated", action = %action, version = version);
}

/// Emit event: old daily notes were dropped.
pub fn emit_pruned(removed: usize, version: u64) {
    info!(event = "memory.pruned", removed = removed, version = version);
}

/// Emit event: the tape was moved aside.
pub fn emit_tape_archived(archive: &Path) {
    info!(event = "tape.archived", archive = %archive.display());
}
