//! Anchor lookups over a materialized tape.
//!
//! Anchors are ordinary entries; there is no separate index on disk. Every
//! function here is a pure computation over the slice returned by
//! `TapeStore::read_all`, so it can be tested without a store.

use serde::{Deserialize, Serialize};
use tape_state::entry::Object;
use tape_state::LogEntry;

/// Which end of the tape a lookup starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    First,
    #[default]
    Last,
}

/// Rendered anchor summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorSummary {
    pub id: u64,
    pub name: String,
    pub state: Object,
}

impl AnchorSummary {
    pub fn from_entry(entry: &LogEntry) -> Option<Self> {
        let name = entry.anchor_name()?;
        Some(Self {
            id: entry.id,
            name: name.to_string(),
            state: entry.anchor_state().cloned().unwrap_or_default(),
        })
    }
}

/// Iterate over `(index, entry)` for every anchor on the tape.
pub fn anchors(entries: &[LogEntry]) -> impl DoubleEndedIterator<Item = (usize, &LogEntry)> {
    entries.iter().enumerate().filter(|(_, e)| e.is_anchor())
}

/// First anchor named `name`, scanning from the chosen end.
pub fn find_anchor_by_name<'a>(
    entries: &'a [LogEntry],
    name: &str,
    direction: Direction,
) -> Option<(usize, &'a LogEntry)> {
    let named = |(_, e): &(usize, &LogEntry)| e.anchor_name() == Some(name);
    match direction {
        Direction::First => anchors(entries).find(named),
        Direction::Last => anchors(entries).rev().find(named),
    }
}

/// `(index, version)` of the `seal_name` anchor with the highest version.
///
/// Ties go to the latest one in tape order. Seals without an integer
/// `state.version` are ignored.
pub fn find_highest_version_seal(entries: &[LogEntry], seal_name: &str) -> Option<(usize, u64)> {
    seals_by_version_desc(entries, seal_name).into_iter().next()
}

/// Every versioned `seal_name` anchor, best candidate first.
///
/// Ordered by version descending, then by position descending.
pub fn seals_by_version_desc(entries: &[LogEntry], seal_name: &str) -> Vec<(usize, u64)> {
    let mut seals: Vec<(usize, u64)> = anchors(entries)
        .filter(|(_, e)| e.anchor_name() == Some(seal_name))
        .filter_map(|(idx, e)| e.anchor_version().map(|v| (idx, v)))
        .collect();
    seals.sort_by(|(ia, va), (ib, vb)| vb.cmp(va).then_with(|| ib.cmp(ia)));
    seals
}

/// Nearest `open_name` anchor before `seal_index` whose version equals `version`.
///
/// Opens of other versions are skipped, even when they are closer.
pub fn find_matching_open(
    entries: &[LogEntry],
    seal_index: usize,
    open_name: &str,
    version: u64,
) -> Option<usize> {
    let end = seal_index.min(entries.len());
    entries[..end].iter().rposition(|e| {
        e.anchor_name() == Some(open_name) && e.anchor_version() == Some(version)
    })
}

/// Entries strictly between two indices, in order.
pub fn between(entries: &[LogEntry], start_exclusive: usize, end_exclusive: usize) -> &[LogEntry] {
    let start = (start_exclusive + 1).min(entries.len());
    let end = end_exclusive.min(entries.len());
    if start >= end {
        return &[];
    }
    &entries[start..end]
}

/// Entries after the last anchor named `name` (empty if there is none).
pub fn entries_after_anchor<'a>(entries: &'a [LogEntry], name: &str) -> &'a [LogEntry] {
    match find_anchor_by_name(entries, name, Direction::Last) {
        Some((idx, _)) => &entries[idx + 1..],
        None => &[],
    }
}

/// Entries after the most recent anchor of any name (the whole tape if none).
pub fn entries_from_last_anchor(entries: &[LogEntry]) -> &[LogEntry] {
    match anchors(entries).next_back() {
        Some((idx, _)) => &entries[idx + 1..],
        None => entries,
    }
}

/// Entries between the last `start` anchor and the first `end` anchor after it.
pub fn entries_between_anchors<'a>(
    entries: &'a [LogEntry],
    start: &str,
    end: &str,
) -> Option<&'a [LogEntry]> {
    let (start_idx, _) = find_anchor_by_name(entries, start, Direction::Last)?;
    let rest = &entries[start_idx + 1..];
    let (end_offset, _) = find_anchor_by_name(rest, end, Direction::First)?;
    Some(&rest[..end_offset])
}
