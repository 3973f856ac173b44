//! Versioned zones: mutable-looking regions on an append-only tape.
//!
//! A zone is written as a pair of anchors sharing a version number, with the
//! zone's content appended between them:
//!
//! ```text
//! <open>{version: v}  event  event  ...  <seal>{version: v}
//! ```
//!
//! The current content is the sealed pair with the highest version. Older
//! pairs stay on the tape and are simply never read again. A write that
//! crashes before its seal leaves an unsealed pair, which readers ignore.

use std::sync::Arc;

use serde_json::json;
use tape_state::entry::Object;
use tape_state::{LogEntry, NewEntry, TapeStore};

use crate::anchors::{between, find_matching_open, seals_by_version_desc};
use crate::error::{Result, ZoneError};
use crate::obs;

/// Guidance ceiling for zone versions before an archive is recommended.
pub const DEFAULT_VERSION_SOFT_CAP: u64 = 500;

/// Anchor names that delimit one kind of zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSpec {
    pub name: &'static str,
    pub open_anchor: &'static str,
    pub seal_anchor: &'static str,
}

/// A sealed, validated version pair located on the tape.
#[derive(Debug, Clone, Copy)]
pub struct ZoneRegion<'a> {
    pub version: u64,
    pub open_index: usize,
    pub seal_index: usize,
    /// Entries strictly between the open and seal anchors.
    pub entries: &'a [LogEntry],
}

/// Find the current region of `spec` on the tape.
///
/// Seals are tried best-first (highest version, then latest). A seal with no
/// matching open anchor, or whose range contains another seal or an open of
/// another version, is reported as corrupt and the next candidate is tried.
pub fn locate<'a>(entries: &'a [LogEntry], spec: &ZoneSpec) -> Option<ZoneRegion<'a>> {
    for (seal_index, version) in seals_by_version_desc(entries, spec.seal_anchor) {
        let Some(open_index) = find_matching_open(entries, seal_index, spec.open_anchor, version)
        else {
            obs::emit_zone_corrupt(&ZoneError::CorruptZone {
                zone: spec.name.to_string(),
                version,
                reason: "seal has no matching open anchor".to_string(),
            });
            continue;
        };

        let inner = between(entries, open_index, seal_index);
        if inner.iter().any(|e| interleaves(e, spec, version)) {
            obs::emit_zone_corrupt(&ZoneError::CorruptZone {
                zone: spec.name.to_string(),
                version,
                reason: "version pair interleaves with another zone anchor".to_string(),
            });
            continue;
        }

        return Some(ZoneRegion {
            version,
            open_index,
            seal_index,
            entries: inner,
        });
    }
    None
}

/// Another seal of the zone, or an open of a different version.
fn interleaves(entry: &LogEntry, spec: &ZoneSpec, version: u64) -> bool {
    match entry.anchor_name() {
        Some(name) if name == spec.seal_anchor => true,
        Some(name) if name == spec.open_anchor => entry.anchor_version() != Some(version),
        _ => false,
    }
}

/// Reader/writer for one zone kind on a shared tape.
pub struct VersionedZone<S: ?Sized> {
    store: Arc<S>,
    spec: ZoneSpec,
    soft_cap: u64,
}

impl<S> VersionedZone<S>
where
    S: TapeStore + ?Sized,
{
    pub fn new(store: Arc<S>, spec: ZoneSpec) -> Self {
        Self {
            store,
            spec,
            soft_cap: DEFAULT_VERSION_SOFT_CAP,
        }
    }

    pub fn with_soft_cap(mut self, soft_cap: u64) -> Self {
        self.soft_cap = soft_cap;
        self
    }

    pub fn spec(&self) -> &ZoneSpec {
        &self.spec
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read the tape and hand the current region (if any) to `f`.
    pub async fn read_with<T>(&self, f: impl FnOnce(Option<ZoneRegion<'_>>) -> T) -> Result<T> {
        let entries = self.store.read_all().await?;
        Ok(f(locate(&entries, &self.spec)))
    }

    /// Version of the current region, or 0 if the zone is absent.
    pub async fn current_version(&self) -> Result<u64> {
        self.read_with(|region| region.map(|r| r.version).unwrap_or(0))
            .await
    }

    /// Append a complete version pair: open, `events`, seal.
    ///
    /// Nothing else is appended between the open and the seal. If an append
    /// fails part way, the pair stays unsealed and the previous version
    /// remains current.
    pub async fn write(&self, version: u64, events: Vec<NewEntry>) -> Result<()> {
        let event_count = events.len();
        self.store
            .append(NewEntry::anchor(self.spec.open_anchor, version_state(version)))
            .await?;
        for event in events {
            self.store.append(event).await?;
        }
        self.store
            .append(NewEntry::anchor(self.spec.seal_anchor, version_state(version)))
            .await?;

        obs::emit_zone_written(self.spec.name, version, event_count);
        if version > self.soft_cap {
            obs::emit_version_soft_cap(self.spec.name, version, self.soft_cap);
        }
        Ok(())
    }
}

fn version_state(version: u64) -> Object {
    let mut state = Object::new();
    state.insert("version".into(), json!(version));
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use tape_state::MemoryTapeStore;

    const SPEC: ZoneSpec = ZoneSpec {
        name: "test",
        open_anchor: "test/open",
        seal_anchor: "test/seal",
    };

    fn tape(items: &[(&str, Option<u64>)]) -> Vec<LogEntry> {
        items
            .iter()
            .enumerate()
            .map(|(i, (name, version))| {
                let entry = match version {
                    Some(v) => NewEntry::anchor(*name, version_state(*v)),
                    None => NewEntry::event(*name, Object::new()),
                };
                LogEntry::from_new(i as u64 + 1, entry)
            })
            .collect()
    }

    #[test]
    fn locate_picks_highest_sealed_pair() {
        let entries = tape(&[
            ("test/open", Some(1)),
            ("e1", None),
            ("test/seal", Some(1)),
            ("test/open", Some(2)),
            ("e2", None),
            ("e3", None),
            ("test/seal", Some(2)),
        ]);
        let region = locate(&entries, &SPEC).unwrap();
        assert_eq!(region.version, 2);
        assert_eq!(region.entries.len(), 2);
    }

    #[test]
    fn unsealed_pair_is_ignored() {
        let entries = tape(&[
            ("test/open", Some(1)),
            ("test/seal", Some(1)),
            ("test/open", Some(2)),
            ("partial", None),
        ]);
        assert_eq!(locate(&entries, &SPEC).unwrap().version, 1);
    }

    #[test]
    fn orphan_seal_falls_back_to_previous_pair() {
        let entries = tape(&[
            ("test/open", Some(4)),
            ("e", None),
            ("test/seal", Some(4)),
            ("test/seal", Some(5)),
        ]);
        let region = locate(&entries, &SPEC).unwrap();
        assert_eq!(region.version, 4);
        assert_eq!(region.entries.len(), 1);
    }

    #[test]
    fn interleaved_pair_is_rejected() {
        let entries = tape(&[
            ("test/open", Some(3)),
            ("test/open", Some(2)),
            ("test/seal", Some(2)),
            ("test/seal", Some(3)),
        ]);
        assert_eq!(locate(&entries, &SPEC).unwrap().version, 2);
    }

    #[test]
    fn pair_enclosing_foreign_open_is_rejected() {
        let entries = tape(&[
            ("test/open", Some(1)),
            ("test/seal", Some(1)),
            ("test/open", Some(3)),
            ("test/open", Some(4)),
            ("from v4", None),
            ("test/seal", Some(3)),
        ]);
        let region = locate(&entries, &SPEC).unwrap();
        assert_eq!(region.version, 1);
        assert!(region.entries.is_empty());
    }

    #[test]
    fn retried_write_after_crash_pairs_with_nearest_open() {
        let entries = tape(&[
            ("test/open", Some(1)),
            ("test/seal", Some(1)),
            ("test/open", Some(2)),
            ("lost", None),
            ("test/open", Some(2)),
            ("kept", None),
            ("test/seal", Some(2)),
        ]);
        let region = locate(&entries, &SPEC).unwrap();
        assert_eq!(region.open_index, 4);
        assert_eq!(region.entries.len(), 1);
        assert_eq!(region.entries[0].event_name(), Some("kept"));
    }

    #[tokio::test]
    async fn write_appends_open_events_seal() {
        let store = Arc::new(MemoryTapeStore::new());
        let zone = VersionedZone::new(Arc::clone(&store), SPEC);
        assert_eq!(zone.current_version().await.unwrap(), 0);

        zone.write(1, vec![NewEntry::event("x", Object::new())])
            .await
            .unwrap();

        let entries = store.read_all().await.unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|e| e.anchor_name().or(e.event_name()).unwrap())
            .collect();
        assert_eq!(names, vec!["test/open", "x", "test/seal"]);
        assert_eq!(zone.current_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_version_current() {
        let store = Arc::new(MemoryTapeStore::new());
        let zone = VersionedZone::new(Arc::clone(&store), SPEC);
        zone.write(1, Vec::new()).await.unwrap();

        store.fail_appends(true);
        assert!(zone.write(2, Vec::new()).await.is_err());
        store.fail_appends(false);

        assert_eq!(zone.current_version().await.unwrap(), 1);
    }
}
