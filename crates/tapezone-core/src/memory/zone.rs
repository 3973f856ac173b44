use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tape_state::entry::Object;
use tape_state::{LogEntry, NewEntry, TapeStore};
use tracing::debug;

use super::snapshot::MemorySnapshot;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ZoneError};
use crate::obs;
use crate::zone::{VersionedZone, ZoneSpec, DEFAULT_VERSION_SOFT_CAP};

pub const MEMORY_OPEN_ANCHOR: &str = "memory/open";
pub const MEMORY_SEAL_ANCHOR: &str = "memory/seal";
pub const MEMORY_LONG_TERM_EVENT: &str = "memory.long_term";
pub const MEMORY_DAILY_EVENT: &str = "memory.daily";
pub const DEFAULT_DAILY_RETENTION_DAYS: u32 = 30;
/// Window for the "Recent Notes" context section.
pub const RECENT_NOTE_DAYS: u32 = 7;

pub const MEMORY_ZONE: ZoneSpec = ZoneSpec {
    name: "memory",
    open_anchor: MEMORY_OPEN_ANCHOR,
    seal_anchor: MEMORY_SEAL_ANCHOR,
};

/// Parameters for [`MemoryZone::recall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallQuery {
    /// Case-insensitive line filter.
    pub query: Option<String>,
    /// How far back daily notes are included.
    pub days: u32,
}

impl Default for RecallQuery {
    fn default() -> Self {
        Self {
            query: None,
            days: RECENT_NOTE_DAYS,
        }
    }
}

/// Short status of the zone, as shown by `memory show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySummary {
    pub version: u64,
    pub long_term_preview: Option<String>,
    pub daily_notes: usize,
    pub latest_date: Option<NaiveDate>,
}

impl fmt::Display for MemorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version={}", self.version)?;
        match &self.long_term_preview {
            Some(preview) => writeln!(f, "long_term=yes ({preview})")?,
            None => writeln!(f, "long_term=no")?,
        }
        write!(f, "daily_notes={}", self.daily_notes)?;
        if let Some(date) = self.latest_date {
            write!(f, " (latest: {date})")?;
        }
        Ok(())
    }
}

/// Tape-native persistent memory.
///
/// Long-term text and dated notes live between `memory/open` and
/// `memory/seal` anchors. Every mutation reads the current snapshot, edits
/// it in memory, and appends the whole snapshot as the next version.
pub struct MemoryZone<S: ?Sized> {
    zone: VersionedZone<S>,
    clock: Arc<dyn Clock>,
}

impl<S> MemoryZone<S>
where
    S: TapeStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            zone: VersionedZone::new(store, MEMORY_ZONE).with_soft_cap(DEFAULT_VERSION_SOFT_CAP),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_soft_cap(mut self, soft_cap: u64) -> Self {
        self.zone = self.zone.with_soft_cap(soft_cap);
        self
    }

    /// Create an empty version 1 if the tape has no valid memory pair.
    ///
    /// Returns `true` when a pair was written.
    pub async fn ensure(&self) -> Result<bool> {
        if self.zone.current_version().await? > 0 {
            return Ok(false);
        }
        self.write_zone(&MemorySnapshot {
            version: 1,
            ..MemorySnapshot::default()
        })
        .await?;
        obs::emit_memory_updated("created", 1);
        Ok(true)
    }

    /// Rebuild the current snapshot from the tape.
    ///
    /// An absent or unreadable zone yields an empty snapshot at version 0.
    pub async fn read(&self) -> Result<MemorySnapshot> {
        self.zone
            .read_with(|region| match region {
                Some(region) => parse_zone_entries(region.entries, region.version),
                None => MemorySnapshot::default(),
            })
            .await
    }

    /// Replace the long-term memory text.
    pub async fn save_long_term(&self, content: &str) -> Result<u64> {
        if content.trim().is_empty() {
            return Err(ZoneError::InvalidArgument(
                "long-term content must not be empty; use clear to wipe memory".into(),
            ));
        }
        let mut snap = self.read().await?;
        snap.set_long_term(content, self.clock.now());
        let version = self.bump_and_write(&mut snap).await?;
        obs::emit_memory_updated("long_term.saved", version);
        Ok(version)
    }

    /// Set the note for `date` (`YYYY-MM-DD`, default today), replacing any
    /// existing note for that date.
    pub async fn append_daily(&self, content: &str, date: Option<&str>) -> Result<u64> {
        if content.trim().is_empty() {
            return Err(ZoneError::InvalidArgument(
                "daily note content must not be empty".into(),
            ));
        }
        let date = match date {
            Some(raw) => parse_date(raw)?,
            None => self.clock.today(),
        };
        let mut snap = self.read().await?;
        snap.set_daily(date, content, self.clock.now());
        let version = self.bump_and_write(&mut snap).await?;
        debug!(date = %date, "daily note written");
        obs::emit_memory_updated("daily.appended", version);
        Ok(version)
    }

    /// Write an empty version. Earlier versions stay on the tape.
    pub async fn clear(&self) -> Result<u64> {
        let mut snap = MemorySnapshot {
            version: self.zone.current_version().await?,
            ..MemorySnapshot::default()
        };
        let version = self.bump_and_write(&mut snap).await?;
        obs::emit_memory_updated("cleared", version);
        Ok(version)
    }

    /// Drop notes older than `retention_days`. Writes only if something was dropped.
    pub async fn prune(&self, retention_days: u32) -> Result<usize> {
        let mut snap = self.read().await?;
        let removed = snap.prune(self.clock.today(), retention_days);
        if removed > 0 {
            let version = self.bump_and_write(&mut snap).await?;
            obs::emit_pruned(removed, version);
        }
        Ok(removed)
    }

    /// Memory text for the system prompt: long-term, today's, and recent notes.
    ///
    /// Empty sections are omitted; returns an empty string if all are empty.
    pub async fn get_context(&self) -> Result<String> {
        let snap = self.read().await?;
        let today = self.clock.today();
        let mut parts: Vec<String> = Vec::new();

        if let Some(long_term) = &snap.long_term {
            parts.push(format!("## Long-term Memory\n{long_term}"));
        }
        if let Some(note) = snap.get_daily(today) {
            parts.push(format!("## Today's Notes\n{}", note.content));
        }
        let recent: Vec<_> = snap
            .recent_dailies(today, RECENT_NOTE_DAYS)
            .into_iter()
            .filter(|note| note.date != today)
            .collect();
        if !recent.is_empty() {
            let mut lines = vec!["## Recent Notes".to_string()];
            for note in recent {
                lines.push(format!("### {}", note.date));
                lines.push(note.content.clone());
            }
            parts.push(lines.join("\n"));
        }

        Ok(parts.join("\n\n"))
    }

    /// Long-term memory plus notes from the last `days` days, optionally
    /// filtered to lines containing `query`.
    pub async fn recall(&self, query: &RecallQuery) -> Result<String> {
        let snap = self.read().await?;
        let mut parts: Vec<String> = Vec::new();
        if let Some(long_term) = &snap.long_term {
            parts.push(format!("## Long-term Memory\n{long_term}"));
        }
        let dailies = snap.recent_dailies(self.clock.today(), query.days);
        if !dailies.is_empty() {
            let mut lines = vec!["## Recent Daily Notes".to_string()];
            for note in dailies {
                lines.push(format!("### {}", note.date));
                lines.push(note.content.clone());
            }
            parts.push(lines.join("\n"));
        }
        if parts.is_empty() {
            return Ok("(no memories stored)".to_string());
        }

        let full = parts.join("\n\n");
        let Some(needle) = query.query.as_deref().filter(|q| !q.is_empty()) else {
            return Ok(full);
        };
        let needle = needle.to_lowercase();
        let matched: Vec<&str> = full
            .lines()
            .filter(|line| line.to_lowercase().contains(&needle))
            .collect();
        if matched.is_empty() {
            Ok(format!("(no matches for '{needle}')\n\nFull memory:\n{full}"))
        } else {
            Ok(matched.join("\n"))
        }
    }

    pub async fn summary(&self) -> Result<MemorySummary> {
        let snap = self.read().await?;
        Ok(MemorySummary {
            version: snap.version,
            long_term_preview: snap.long_term.as_deref().map(|t| preview(t, 100)),
            daily_notes: snap.dailies.len(),
            latest_date: snap.latest_date(),
        })
    }

    async fn bump_and_write(&self, snap: &mut MemorySnapshot) -> Result<u64> {
        snap.version = snap
            .version
            .checked_add(1)
            .ok_or_else(|| ZoneError::VersionExhausted {
                zone: MEMORY_ZONE.name.to_string(),
                version: snap.version,
            })?;
        self.write_zone(snap).await?;
        Ok(snap.version)
    }

    async fn write_zone(&self, snap: &MemorySnapshot) -> Result<()> {
        self.zone.write(snap.version, zone_events(snap, self.clock.now())).await
    }
}

/// Events for one version: long-term first (if any), then notes by ascending date.
fn zone_events(snap: &MemorySnapshot, now: DateTime<Utc>) -> Vec<NewEntry> {
    let mut events = Vec::with_capacity(snap.dailies.len() + 1);
    if let Some(long_term) = snap.long_term.as_deref().filter(|t| !t.is_empty()) {
        let updated_at = snap.long_term_updated_at.unwrap_or(now);
        events.push(NewEntry::event(
            MEMORY_LONG_TERM_EVENT,
            object(json!({
                "content": long_term,
                "updated_at": updated_at,
            })),
        ));
    }
    for note in snap.dailies.values() {
        events.push(NewEntry::event(
            MEMORY_DAILY_EVENT,
            object(json!({
                "date": note.date,
                "content": note.content,
                "updated_at": note.updated_at,
            })),
        ));
    }
    events
}

/// Build a snapshot from the entries between a matched open/seal pair.
///
/// Malformed memory events are skipped; the last long-term event wins and the
/// last note per date wins.
fn parse_zone_entries(entries: &[LogEntry], version: u64) -> MemorySnapshot {
    let mut snap = MemorySnapshot {
        version,
        ..MemorySnapshot::default()
    };
    for entry in entries {
        let (Some(name), Some(data)) = (entry.event_name(), entry.event_data()) else {
            continue;
        };
        let content = data.get("content").and_then(Value::as_str);
        let updated_at = data
            .get("updated_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        match name {
            MEMORY_LONG_TERM_EVENT => {
                if let Some(content) = content {
                    snap.long_term = Some(content.to_string());
                    snap.long_term_updated_at = updated_at;
                }
            }
            MEMORY_DAILY_EVENT => {
                let date = data
                    .get("date")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<NaiveDate>().ok());
                if let (Some(date), Some(content)) = (date, content) {
                    snap.set_daily(date, content, updated_at.unwrap_or_default());
                }
            }
            _ => {}
        }
    }
    snap
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ZoneError::InvalidArgument(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

fn object(value: Value) -> Object {
    match value {
        Value::Object(map) => map,
        _ => Object::new(),
    }
}

fn preview(text: &str, limit: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= limit {
        return single_line;
    }
    let cut: String = single_line.chars().take(limit.saturating_sub(3)).collect();
    format!("{cut}...")
}
