//! Runtime configuration, resolved from the environment.
//!
//! | Variable                    | Default        |
//! |-----------------------------|----------------|
//! | `TAPEZONE_HOME`             | `~/.tapezone`  |
//! | `TAPEZONE_RETENTION_DAYS`   | `30`           |
//! | `TAPEZONE_VERSION_SOFT_CAP` | `500`          |
//! | `TAPEZONE_CONTEXT_CHARS`    | `8000`         |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

use crate::context::ContextBudget;
use crate::memory::DEFAULT_DAILY_RETENTION_DAYS;
use crate::zone::DEFAULT_VERSION_SOFT_CAP;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeConfig {
    /// Root directory; tapes live under `<home>/tapes/`.
    pub home: PathBuf,
    /// Workspace whose tape is opened.
    pub workspace: PathBuf,
    pub retention_days: u32,
    pub version_soft_cap: u64,
    pub context_budget: ContextBudget,
}

impl TapeConfig {
    pub fn new(home: impl Into<PathBuf>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            workspace: workspace.into(),
            retention_days: DEFAULT_DAILY_RETENTION_DAYS,
            version_soft_cap: DEFAULT_VERSION_SOFT_CAP,
            context_budget: ContextBudget::default(),
        }
    }

    /// Build from `TAPEZONE_*` variables. Unparseable values fall back to defaults.
    pub fn from_env(workspace: impl AsRef<Path>) -> Self {
        Self::from_lookup(workspace, |key| std::env::var(key).ok())
    }

    /// Same as [`TapeConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(
        workspace: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let home = lookup("TAPEZONE_HOME")
            .filter(|v| !v.is_empty())
            .map(|v| expand_home(&v))
            .unwrap_or_else(default_home);

        let mut config = Self::new(home, workspace.as_ref());
        if let Some(days) = parse_var(&lookup, "TAPEZONE_RETENTION_DAYS") {
            config.retention_days = days;
        }
        if let Some(cap) = parse_var(&lookup, "TAPEZONE_VERSION_SOFT_CAP") {
            config.version_soft_cap = cap;
        }
        if let Some(chars) = parse_var(&lookup, "TAPEZONE_CONTEXT_CHARS") {
            config.context_budget = ContextBudget::new(chars);
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

fn user_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn default_home() -> PathBuf {
    user_home()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tapezone")
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => user_home().map(|h| h.join(rest)).unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = TapeConfig::from_lookup("/ws", lookup(&[]));
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.version_soft_cap, 500);
        assert_eq!(config.context_budget, ContextBudget::default());
        assert!(config.home.ends_with(".tapezone"));
    }

    #[test]
    fn overrides_from_env() {
        let config = TapeConfig::from_lookup(
            "/ws",
            lookup(&[
                ("TAPEZONE_HOME", "/srv/tapes"),
                ("TAPEZONE_RETENTION_DAYS", "14"),
                ("TAPEZONE_VERSION_SOFT_CAP", "50"),
                ("TAPEZONE_CONTEXT_CHARS", "1200"),
            ]),
        );
        assert_eq!(config.home, PathBuf::from("/srv/tapes"));
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.version_soft_cap, 50);
        assert_eq!(config.context_budget.max_chars, 1200);
    }

    #[test]
    fn bad_values_fall_back() {
        let config =
            TapeConfig::from_lookup("/ws", lookup(&[("TAPEZONE_RETENTION_DAYS", "soon")]));
        assert_eq!(config.retention_days, 30);
    }
}
