//! Tape file location for a workspace.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::store::StoreResult;

/// Default tape name reported by stores.
pub const DEFAULT_TAPE_NAME: &str = "session";

/// Resolved tape paths for a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapePaths {
    pub home: PathBuf,
    pub tape_file: PathBuf,
    pub lock_file: PathBuf,
}

/// Stable hash for a workspace path (first 32 hex chars of SHA-256).
///
/// The path is canonicalized when it exists so `./x` and `/abs/x` share a tape.
pub fn workspace_hash(path: &Path) -> String {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let digest = Sha256::digest(resolved.to_string_lossy().as_bytes());
    hex::encode(digest)[..32].to_string()
}

/// Resolve `<home>/tapes/<hash>.jsonl`, creating the tapes directory.
pub fn resolve_tape_paths(home: &Path, workspace: &Path) -> StoreResult<TapePaths> {
    let tape_dir = home.join("tapes");
    fs::create_dir_all(&tape_dir)?;
    let hash = workspace_hash(workspace);
    Ok(TapePaths {
        home: home.to_path_buf(),
        tape_file: tape_dir.join(format!("{hash}.jsonl")),
        lock_file: tape_dir.join(format!("{hash}.lock")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_short() {
        let a = workspace_hash(Path::new("/tmp/some/workspace"));
        let b = workspace_hash(Path::new("/tmp/some/workspace"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn different_workspaces_get_different_tapes() {
        let a = workspace_hash(Path::new("/tmp/ws-a"));
        let b = workspace_hash(Path::new("/tmp/ws-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_creates_tape_dir() {
        let home = tempfile::tempdir().unwrap();
        let paths = resolve_tape_paths(home.path(), Path::new("/tmp/ws")).unwrap();
        assert!(home.path().join("tapes").is_dir());
        assert_eq!(paths.tape_file.extension().unwrap(), "jsonl");
        assert_eq!(paths.home, home.path());
    }
}
