//! Point-in-time contents of the memory zone.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One day's memory note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNote {
    pub date: NaiveDate,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of the memory zone, rebuilt from the tape on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// Version of the pair this was built from (0 when the zone is empty).
    pub version: u64,
    pub long_term: Option<String>,
    pub long_term_updated_at: Option<DateTime<Utc>>,
    /// At most one note per date, ascending.
    pub dailies: BTreeMap<NaiveDate, DailyNote>,
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.long_term.is_none() && self.dailies.is_empty()
    }

    pub fn get_daily(&self, date: NaiveDate) -> Option<&DailyNote> {
        self.dailies.get(&date)
    }

    /// Set (or replace) the note for `date`.
    pub fn set_daily(&mut self, date: NaiveDate, content: impl Into<String>, now: DateTime<Utc>) {
        self.dailies.insert(
            date,
            DailyNote {
                date,
                content: content.into(),
                updated_at: now,
            },
        );
    }

    pub fn set_long_term(&mut self, content: impl Into<String>, now: DateTime<Utc>) {
        self.long_term = Some(content.into());
        self.long_term_updated_at = Some(now);
    }

    /// Notes dated within the last `days` days of `today` (inclusive), newest first.
    ///
    /// Notes dated after `today` are left out.
    pub fn recent_dailies(&self, today: NaiveDate, days: u32) -> Vec<&DailyNote> {
        self.dailies
            .range(cutoff(today, days)..=today)
            .rev()
            .map(|(_, note)| note)
            .collect()
    }

    /// Drop notes dated before `today - retention_days`. Returns count removed.
    pub fn prune(&mut self, today: NaiveDate, retention_days: u32) -> usize {
        let before = self.dailies.len();
        self.dailies = self.dailies.split_off(&cutoff(today, retention_days));
        before - self.dailies.len()
    }

    /// Most recent note date.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dailies.keys().next_back().copied()
    }
}

/// `today - days`, clamped to the earliest representable date.
fn cutoff(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}
