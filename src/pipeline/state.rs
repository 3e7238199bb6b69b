// Transfer state store: which Mastodon posts are already on Bluesky.
//
// The state file is plain JSON so it can be inspected and edited by hand.
// It is rewritten after every committed post (never batched), through a
// temp file + rename, so an interrupted run leaves either the previous or
// the new version on disk and never a torn one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

/// Durable record of transferred posts. The id set only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferState {
    #[serde(default)]
    pub last_mastodon_id: Option<String>,
    #[serde(default, serialize_with = "sorted_ids")]
    pub transferred_ids: HashSet<String>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl Default for TransferState {
    fn default() -> Self {
        Self {
            last_mastodon_id: None,
            transferred_ids: HashSet::new(),
            last_updated: Utc::now(),
        }
    }
}

// Sorted so the file diffs cleanly between runs.
fn sorted_ids<S: Serializer>(ids: &HashSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&String> = ids.iter().collect();
    sorted.sort();
    sorted.serialize(serializer)
}

// Older state files carry a naive local timestamp with no offset. It is
// read as UTC, and an unreadable one becomes "now" so the id set survives.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(raw) = value.as_str() else {
        return Ok(Utc::now());
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    Ok(NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now()))
}

/// Owns the state for one run and its file.
pub struct StateStore {
    path: PathBuf,
    preview: bool,
    state: TransferState,
    load_warning: Option<String>,
}

impl StateStore {
    /// Load state from `path`.
    ///
    /// Never fails: a missing file is a cold start, and an unreadable or
    /// malformed one is a cold start with a warning (see `load_warning`).
    /// In preview mode the store never writes.
    pub fn load(path: impl Into<PathBuf>, preview: bool) -> Self {
        let path = path.into();
        let (state, load_warning) = match read_state(&path) {
            Ok(Some(state)) => {
                debug!(
                    path = %path.display(),
                    transferred = state.transferred_ids.len(),
                    "Loaded transfer state"
                );
                (state, None)
            }
            Ok(None) => (TransferState::default(), None),
            Err(e) => {
                let message = format!("Could not load state file {}: {e:#}", path.display());
                warn!("{message}");
                (TransferState::default(), Some(message))
            }
        };

        Self {
            path,
            preview,
            state,
            load_warning,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Why the previous state couldn't be used, if it couldn't.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn contains(&self, source_post_id: &str) -> bool {
        self.state.transferred_ids.contains(source_post_id)
    }

    /// Mark a post as transferred and persist immediately.
    ///
    /// The in-memory state only changes once the write has succeeded, so a
    /// failed commit never leaks into a later save.
    pub fn record(&mut self, source_post_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut next = self.state.clone();
        next.transferred_ids.insert(source_post_id.to_string());
        next.last_mastodon_id = Some(source_post_id.to_string());
        next.last_updated = at;

        if !self.preview {
            write_state(&self.path, &next)?;
        }
        self.state = next;
        Ok(())
    }
}

fn read_state(path: &Path) -> Result<Option<TransferState>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).context("read failed")?;
    let state = serde_json::from_str(&raw).context("invalid state JSON")?;
    Ok(Some(state))
}

fn write_state(path: &Path, state: &TransferState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory for state file: {}", path.display())
            })?;
        }
    }

    let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write state file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace state file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_missing_file_is_cold_start_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("state.json"), false);
        assert!(store.state().transferred_ids.is_empty());
        assert!(store.load_warning().is_none());
    }

    #[test]
    fn test_corrupt_file_is_cold_start_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{\"transferred_ids\": 42").unwrap();
        let store = StateStore::load(&path, false);
        assert!(store.state().transferred_ids.is_empty());
        assert!(store.load_warning().is_some());
    }

    #[test]
    fn test_record_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut store = StateStore::load(&path, false);
        store.record("111", at(0)).unwrap();
        store.record("222", at(5)).unwrap();

        let reloaded = StateStore::load(&path, false);
        assert!(reloaded.contains("111"));
        assert!(reloaded.contains("222"));
        assert!(!reloaded.contains("333"));
        assert_eq!(reloaded.state().last_mastodon_id.as_deref(), Some("222"));
        assert_eq!(reloaded.state().last_updated, at(5));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_preview_mode_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = StateStore::load(&path, true);
        store.record("111", at(0)).unwrap();
        assert!(store.contains("111"));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_format_is_sorted_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = StateStore::load(&path, false);
        store.record("30", at(0)).unwrap();
        store.record("10", at(1)).unwrap();
        store.record("20", at(2)).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["transferred_ids"], serde_json::json!(["10", "20", "30"]));
        assert_eq!(json["last_mastodon_id"], "20");
        assert!(json["last_updated"].as_str().unwrap().starts_with("2023-11-14T22:13:"));
    }

    #[test]
    fn test_loads_state_with_naive_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"last_mastodon_id":"111","transferred_ids":["109","110","111"],"last_updated":"2024-05-01T10:00:00.123456"}"#,
        )
        .unwrap();

        let store = StateStore::load(&path, false);
        assert!(store.load_warning().is_none());
        assert!(store.contains("109"));
        assert!(store.contains("111"));
        assert_eq!(
            store.state().last_updated,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
                + chrono::Duration::microseconds(123_456)
        );
    }

    #[test]
    fn test_unreadable_timestamp_keeps_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"transferred_ids":["1"],"last_updated":"last tuesday"}"#,
        )
        .unwrap();

        let store = StateStore::load(&path, false);
        assert!(store.load_warning().is_none());
        assert!(store.contains("1"));
    }

    #[test]
    fn test_failed_write_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        // A directory at the state path makes the final rename fail.
        std::fs::create_dir(&path).unwrap();
        let mut store = StateStore::load(&path, false);

        assert!(store.record("P", at(0)).is_err());
        assert!(!store.contains("P"));

        std::fs::remove_dir(&path).unwrap();
        store.record("Q", at(1)).unwrap();

        let reloaded = StateStore::load(&path, false);
        assert!(reloaded.contains("Q"));
        assert!(!reloaded.contains("P"));
        assert_eq!(reloaded.state().last_mastodon_id.as_deref(), Some("Q"));
    }

    #[test]
    fn test_loads_state_written_without_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"transferred_ids": ["1", "2"]}"#).unwrap();
        let store = StateStore::load(&path, false);
        assert!(store.load_warning().is_none());
        assert!(store.contains("2"));
        assert!(store.state().last_mastodon_id.is_none());
    }
}
