// src/state.rs
//! Persisted set of already-notified disclosure ids. Loaded once at startup,
//! rewritten once per batch. Writes go to a sibling temp file first and are
//! renamed over the target, so a crash mid-write leaves either the old or the
//! new file on disk, never a torn one.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// Object form an earlier deployment wrote: `{"seen": [...]}`.
#[derive(Debug, Deserialize)]
struct SeenWrapper {
    #[serde(default)]
    seen: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeenFile {
    Ids(Vec<String>),
    Wrapped(SeenWrapper),
}

#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl SeenStore {
    /// Read the state file, accepting every format we have ever written:
    /// empty file, JSON array, `{"seen": [...]}` object, or the legacy
    /// newline-delimited list. A file that is not valid UTF-8 is renamed
    /// aside and the store starts empty; corruption is never fatal.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ids = match std::fs::read(&path) {
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading state file {}", path.display()))
            }
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(raw) => parse_ids(&raw),
                Err(_) => {
                    quarantine(&path);
                    BTreeSet::new()
                }
            },
        };
        info!(count = ids.len(), path = %path.display(), "seen-state loaded");
        Ok(Self { path, ids })
    }

    pub fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true when the id was not present before. Ids are never removed.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write the full id set as a sorted JSON array via temp-file-plus-rename.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating state dir {}", dir.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.ids).context("encoding seen-state")?;
        let tmp = sibling(&self.path, ".tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("writing temp state file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing state file {}", self.path.display()))?;
        Ok(())
    }
}

fn parse_ids(raw: &str) -> BTreeSet<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return BTreeSet::new();
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return match serde_json::from_str::<SeenFile>(trimmed) {
            Ok(SeenFile::Ids(ids)) => collect_clean(ids),
            Ok(SeenFile::Wrapped(w)) => collect_clean(w.seen),
            Err(e) => {
                warn!("seen-state JSON unreadable, starting empty: {e:#}");
                BTreeSet::new()
            }
        };
    }
    // Legacy format: one id per line.
    trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn collect_clean(ids: Vec<String>) -> BTreeSet<String> {
    ids.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn quarantine(path: &Path) {
    let backup = sibling(path, ".bak");
    match std::fs::rename(path, &backup) {
        Ok(()) => warn!(
            backup = %backup.display(),
            "seen-state not UTF-8, moved aside and starting empty"
        ),
        Err(e) => warn!("seen-state unreadable and backup rename failed: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_files_start_empty() {
        assert!(parse_ids("").is_empty());
        assert!(parse_ids("  \n\t ").is_empty());
    }

    #[test]
    fn json_array_and_wrapped_object_agree() {
        let from_array = parse_ids(r#"["b", "a", "a"]"#);
        let from_object = parse_ids(r#"{"seen": ["a", "b"]}"#);
        assert_eq!(from_array, from_object);
        assert_eq!(from_array.len(), 2);
    }

    #[test]
    fn legacy_newline_list_matches_json_array() {
        let legacy = parse_ids("a\n\nb\n  c  \n");
        let json = parse_ids(r#"["a","b","c"]"#);
        assert_eq!(legacy, json);
    }

    #[test]
    fn malformed_json_starts_empty_instead_of_failing() {
        assert!(parse_ids(r#"{"seen": "#).is_empty());
        assert!(parse_ids("[1, 2, {]").is_empty());
    }
}
