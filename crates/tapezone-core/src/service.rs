//! Session-owned tape service.
//!
//! One `TapeService` per session: it owns the store handle and the memory
//! zone bound to it, and exposes the tape operations the tool layer calls.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tape_state::entry::Object;
use tape_state::{EntryKind, FileTapeStore, LogEntry, NewEntry, TapeStore};

use crate::anchors::{
    anchors, entries_after_anchor, entries_between_anchors, entries_from_last_anchor,
    AnchorSummary,
};
use crate::clock::{Clock, SystemClock};
use crate::config::TapeConfig;
use crate::context::{render_memory_block, ContextBudget};
use crate::error::Result;
use crate::memory::MemoryZone;
use crate::obs;

/// Anchor written at the start of every fresh tape.
pub const BOOTSTRAP_ANCHOR: &str = "session/start";

/// Runtime tape summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeInfo {
    pub name: String,
    pub entries: usize,
    pub anchors: usize,
    pub last_anchor: Option<String>,
}

/// Outcome of [`TapeService::reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    Archived(PathBuf),
    /// The tape was already empty; nothing was moved.
    Empty,
}

pub struct TapeService<S: ?Sized> {
    store: Arc<S>,
    memory: MemoryZone<S>,
    context_budget: ContextBudget,
}

impl TapeService<FileTapeStore> {
    /// Open the workspace tape described by `config`.
    pub fn open(config: &TapeConfig) -> Result<Self> {
        let store = FileTapeStore::open_workspace(&config.home, &config.workspace)?;
        Ok(Self::new(Arc::new(store))
            .with_soft_cap(config.version_soft_cap)
            .with_context_budget(config.context_budget))
    }
}

impl<S> TapeService<S>
where
    S: TapeStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let memory = MemoryZone::new(Arc::clone(&store)).with_clock(clock);
        Self {
            store,
            memory,
            context_budget: ContextBudget::default(),
        }
    }

    pub fn with_soft_cap(mut self, soft_cap: u64) -> Self {
        self.memory = self.memory.with_soft_cap(soft_cap);
        self
    }

    pub fn with_context_budget(mut self, budget: ContextBudget) -> Self {
        self.context_budget = budget;
        self
    }

    pub fn memory(&self) -> &MemoryZone<S> {
        &self.memory
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Session start: bootstrap anchor plus an initialised memory zone.
    pub async fn start_session(&self) -> Result<()> {
        self.ensure_bootstrap_anchor().await?;
        self.memory.ensure().await?;
        Ok(())
    }

    /// Append `session/start` if the tape has no anchors at all.
    pub async fn ensure_bootstrap_anchor(&self) -> Result<bool> {
        let entries = self.store.read_all().await?;
        if anchors(&entries).next().is_some() {
            return Ok(false);
        }
        let mut state = Object::new();
        state.insert("owner".into(), json!("human"));
        self.store
            .append(NewEntry::anchor(BOOTSTRAP_ANCHOR, state))
            .await?;
        Ok(true)
    }

    pub async fn read_entries(&self) -> Result<Vec<LogEntry>> {
        Ok(self.store.read_all().await?)
    }

    /// Create a named anchor with optional state.
    pub async fn handoff(&self, name: &str, state: Object) -> Result<u64> {
        Ok(self.store.append(NewEntry::anchor(name, state)).await?)
    }

    pub async fn append_event(&self, name: &str, data: Object) -> Result<u64> {
        Ok(self.store.append(NewEntry::event(name, data)).await?)
    }

    pub async fn append_system(&self, content: &str) -> Result<u64> {
        Ok(self.store.append(NewEntry::system(content)).await?)
    }

    pub async fn info(&self) -> Result<TapeInfo> {
        let entries = self.store.read_all().await?;
        let anchor_list: Vec<_> = anchors(&entries).collect();
        let last_anchor = anchor_list
            .last()
            .and_then(|(_, e)| e.anchor_name())
            .map(str::to_string);
        Ok(TapeInfo {
            name: self.store.name().to_string(),
            entries: entries.len(),
            anchors: anchor_list.len(),
            last_anchor,
        })
    }

    /// The most recent `limit` anchors, oldest first.
    pub async fn anchors(&self, limit: usize) -> Result<Vec<AnchorSummary>> {
        let entries = self.store.read_all().await?;
        let all: Vec<AnchorSummary> = anchors(&entries)
            .filter_map(|(_, e)| AnchorSummary::from_entry(e))
            .collect();
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }

    /// Case-insensitive substring search over kind, payload, and metadata.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<LogEntry>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let needle = query.to_lowercase();
        let entries = self.store.read_all().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                let payload = Value::Object(entry.payload.clone()).to_string();
                let meta = Value::Object(entry.meta.clone()).to_string();
                entry.kind.as_str().to_lowercase().contains(&needle)
                    || payload.to_lowercase().contains(&needle)
                    || meta.to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect())
    }

    /// Entries between the last `start` anchor and the next `end` anchor.
    ///
    /// `kinds` narrows the result; an empty slice keeps every kind.
    pub async fn between_anchors(
        &self,
        start: &str,
        end: &str,
        kinds: &[EntryKind],
    ) -> Result<Vec<LogEntry>> {
        let entries = self.store.read_all().await?;
        Ok(entries_between_anchors(&entries, start, end)
            .map(|slice| of_kinds(slice, kinds))
            .unwrap_or_default())
    }

    pub async fn after_anchor(&self, name: &str, kinds: &[EntryKind]) -> Result<Vec<LogEntry>> {
        let entries = self.store.read_all().await?;
        Ok(of_kinds(entries_after_anchor(&entries, name), kinds))
    }

    pub async fn from_last_anchor(&self, kinds: &[EntryKind]) -> Result<Vec<LogEntry>> {
        let entries = self.store.read_all().await?;
        Ok(of_kinds(entries_from_last_anchor(&entries), kinds))
    }

    /// Archive the tape, then bootstrap a fresh one.
    ///
    /// Memory lives on the tape, so it is archived along with everything else.
    pub async fn reset(&self) -> Result<ResetOutcome> {
        let archived = self.store.archive_and_clear().await?;
        self.start_session().await?;
        Ok(match archived {
            Some(path) => {
                obs::emit_tape_archived(&path);
                ResetOutcome::Archived(path)
            }
            None => ResetOutcome::Empty,
        })
    }

    /// Memory block for the system prompt, or `None` when memory is empty.
    pub async fn memory_prompt_block(&self) -> Result<Option<String>> {
        let context = self.memory.get_context().await?;
        Ok(render_memory_block(&context, &self.context_budget))
    }
}

fn of_kinds(entries: &[LogEntry], kinds: &[EntryKind]) -> Vec<LogEntry> {
    entries
        .iter()
        .filter(|entry| kinds.is_empty() || kinds.contains(&entry.kind))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tape_state::MemoryTapeStore;

    fn service() -> TapeService<MemoryTapeStore> {
        TapeService::new(Arc::new(MemoryTapeStore::new()))
    }

    #[tokio::test]
    async fn bootstrap_anchor_written_once() {
        let svc = service();
        assert!(svc.ensure_bootstrap_anchor().await.unwrap());
        assert!(!svc.ensure_bootstrap_anchor().await.unwrap());
        let info = svc.info().await.unwrap();
        assert_eq!(info.entries, 1);
        assert_eq!(info.last_anchor.as_deref(), Some(BOOTSTRAP_ANCHOR));
    }

    #[tokio::test]
    async fn anchors_limit_keeps_most_recent() {
        let svc = service();
        for name in ["a", "b", "c"] {
            svc.handoff(name, Object::new()).await.unwrap();
        }
        let names: Vec<String> = svc
            .anchors(2)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_limited() {
        let svc = service();
        svc.append_system("Error: disk full").await.unwrap();
        svc.append_system("all good").await.unwrap();
        svc.append_system("another ERROR").await.unwrap();

        assert_eq!(svc.search("error", 10).await.unwrap().len(), 2);
        assert_eq!(svc.search("error", 1).await.unwrap().len(), 1);
        assert!(svc.search("", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn anchor_slices_filter_by_kind() {
        let svc = service();
        svc.handoff("plan", Object::new()).await.unwrap();
        svc.append_system("thinking").await.unwrap();
        svc.append_event("step", Object::new()).await.unwrap();
        svc.handoff("done", Object::new()).await.unwrap();
        svc.append_system("after").await.unwrap();

        let all = svc.between_anchors("plan", "done", &[]).await.unwrap();
        assert_eq!(all.len(), 2);
        let events = svc
            .between_anchors("plan", "done", &[EntryKind::Event])
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name(), Some("step"));

        let system = svc.after_anchor("plan", &[EntryKind::System]).await.unwrap();
        assert_eq!(system.len(), 2);
        assert!(svc
            .from_last_anchor(&[EntryKind::Event])
            .await
            .unwrap()
            .is_empty());
        assert_eq!(svc.from_last_anchor(&[]).await.unwrap().len(), 1);
        assert!(svc
            .between_anchors("missing", "done", &[])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reset_archives_and_rebootstraps() {
        let svc = service();
        svc.start_session().await.unwrap();
        svc.memory().save_long_term("keep?").await.unwrap();

        let outcome = svc.reset().await.unwrap();
        assert!(matches!(outcome, ResetOutcome::Archived(_)));
        assert_eq!(svc.store().archives().len(), 1);

        let snap = svc.memory().read().await.unwrap();
        assert_eq!(snap.version, 1);
        assert!(snap.long_term.is_none());
        assert_eq!(
            svc.info().await.unwrap().anchors,
            3,
            "session/start plus an empty memory pair"
        );
    }

    #[tokio::test]
    async fn empty_memory_renders_no_prompt_block() {
        let svc = service();
        svc.start_session().await.unwrap();
        assert!(svc.memory_prompt_block().await.unwrap().is_none());

        svc.memory().save_long_term("likes tea").await.unwrap();
        let block = svc.memory_prompt_block().await.unwrap().unwrap();
        assert!(block.contains("memory.recall"));
        assert!(block.contains("likes tea"));
    }
}
