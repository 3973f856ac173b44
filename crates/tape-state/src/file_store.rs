//! JSONL file backend for [`TapeStore`].
//!
//! One tape per file, one entry per line. Appends are serialized through an
//! in-process mutex and the file is guarded against other processes by an
//! advisory lock on a sidecar `.lock` file, held for the life of the store.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use tracing::{debug, warn};

use crate::entry::{LogEntry, NewEntry};
use crate::error::StoreError;
use crate::paths::{resolve_tape_paths, DEFAULT_TAPE_NAME};
use crate::store::{StoreResult, TapeStore};

/// Append-only JSONL tape store (single tape per workspace).
pub struct FileTapeStore {
    name: String,
    path: PathBuf,
    inner: Arc<Mutex<TapeFile>>,
    // Held for its advisory lock; released when the store is dropped.
    _lock: File,
}

impl FileTapeStore {
    /// Open the tape at `path`, taking the exclusive advisory lock.
    ///
    /// Fails with [`StoreError::Locked`] if another process has the tape open.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        Self::open_with_lock(path, lock_path)
    }

    /// Open the tape for `workspace` under `<home>/tapes/`.
    pub fn open_workspace(home: impl AsRef<Path>, workspace: impl AsRef<Path>) -> StoreResult<Self> {
        let paths = resolve_tape_paths(home.as_ref(), workspace.as_ref())?;
        Self::open_with_lock(paths.tape_file, paths.lock_file)
    }

    fn open_with_lock(path: PathBuf, lock_path: PathBuf) -> StoreResult<Self> {
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked { path: path.clone() })?;

        debug!(tape = %path.display(), "tape opened");
        Ok(Self {
            name: DEFAULT_TAPE_NAME.to_string(),
            path: path.clone(),
            inner: Arc::new(Mutex::new(TapeFile::new(path))),
            _lock: lock,
        })
    }

    /// Override the reported tape name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run_blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut TapeFile) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut file = inner.lock().map_err(|_| StoreError::Poisoned)?;
            op(&mut file)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl TapeStore for FileTapeStore {
    async fn append(&self, entry: NewEntry) -> StoreResult<u64> {
        self.run_blocking(move |file| file.append(entry)).await
    }

    async fn read_all(&self) -> StoreResult<Vec<LogEntry>> {
        self.run_blocking(|file| file.read_all()).await
    }

    async fn archive_and_clear(&self) -> StoreResult<Option<PathBuf>> {
        self.run_blocking(|file| file.archive()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Mutable state behind the writer lock.
struct TapeFile {
    path: PathBuf,
    next_id: Option<u64>,
}

impl TapeFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            next_id: None,
        }
    }

    fn append(&mut self, entry: NewEntry) -> StoreResult<u64> {
        let id = self.next_entry_id()?;
        let mut line = serde_json::to_string(&LogEntry::from_new(id, entry))?;
        line.push('\n');

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut handle| {
                handle.write_all(line.as_bytes())?;
                handle.sync_data()
            });
        if let Err(err) = written {
            // Force a tail check before the next append.
            self.next_id = None;
            return Err(err.into());
        }

        self.next_id = Some(id + 1);
        Ok(id)
    }

    fn read_all(&self) -> StoreResult<Vec<LogEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries: Vec<LogEntry> = scan_lines(&bytes)
            .filter_map(|line| parse_line(line.number, line.bytes))
            .collect();
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    fn archive(&mut self) -> StoreResult<Option<PathBuf>> {
        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len == 0 {
            return Ok(None);
        }

        let archive_path = self.archive_path();
        fs::rename(&self.path, &archive_path)?;
        File::create(&self.path)?;
        self.next_id = None;
        Ok(Some(archive_path))
    }

    /// `<stem>.<YYYYmmdd-HHMMSS>[-n].jsonl` next to the tape.
    fn archive_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_TAPE_NAME.to_string());
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut candidate = self.path.with_file_name(format!("{stem}.{timestamp}.jsonl"));
        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .path
                .with_file_name(format!("{stem}.{timestamp}-{n}.jsonl"));
            n += 1;
        }
        candidate
    }

    /// Next id to assign. The first call after open (or after a failed write)
    /// repairs the file tail and scans for the highest stored id.
    fn next_entry_id(&mut self) -> StoreResult<u64> {
        if let Some(id) = self.next_id {
            return Ok(id);
        }
        let last_id = self.recover()?;
        self.next_id = Some(last_id + 1);
        Ok(last_id + 1)
    }

    /// Truncate a damaged trailing record and return the highest stored id.
    ///
    /// A final line without a newline is kept (and terminated) if it parses;
    /// otherwise it is the remains of an interrupted append and is cut off.
    fn recover(&mut self) -> StoreResult<u64> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        if let Some(tail_start) = unterminated_tail_start(&bytes) {
            let tail = &bytes[tail_start..];
            if serde_json::from_slice::<LogEntry>(tail).is_ok() {
                let mut handle = OpenOptions::new().append(true).open(&self.path)?;
                handle.write_all(b"\n")?;
                handle.sync_data()?;
            } else {
                warn!(
                    tape = %self.path.display(),
                    dropped_bytes = tail.len(),
                    "truncating damaged tape tail"
                );
                let handle = OpenOptions::new().write(true).open(&self.path)?;
                handle.set_len(tail_start as u64)?;
                handle.sync_data()?;
            }
        }

        let last_id = scan_lines(&bytes)
            .filter_map(|line| serde_json::from_slice::<LogEntry>(line.bytes).ok())
            .map(|entry| entry.id)
            .max()
            .unwrap_or(0);
        Ok(last_id)
    }
}

/// Offset where an unterminated final line begins, if there is one.
fn unterminated_tail_start(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return None;
    }
    Some(
        bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0),
    )
}

struct Line<'a> {
    number: usize,
    bytes: &'a [u8],
}

fn scan_lines(bytes: &[u8]) -> impl Iterator<Item = Line<'_>> {
    bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .map(|(idx, bytes)| Line {
            number: idx + 1,
            bytes,
        })
        .filter(|line| !line.bytes.iter().all(u8::is_ascii_whitespace))
}

fn parse_line(number: usize, bytes: &[u8]) -> Option<LogEntry> {
    match serde_json::from_slice::<LogEntry>(bytes) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(line = number, error = %err, "skipping unreadable tape line");
            None
        }
    }
}
