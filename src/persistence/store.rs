use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::SessionRecord;

/// Per-wallet session persistence under `<state_dir>/session/`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("session"),
        }
    }

    /// Default state directory: `~/.minefleet` or `$MINEFLEET_STATE_DIR`.
    pub fn default_state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("MINEFLEET_STATE_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".minefleet")
        }
    }

    pub fn record_path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{identity}.json"))
    }

    /// Load the record for a wallet. An absent, unreadable, or corrupt file
    /// is a normal first-run condition and yields `None`.
    pub fn load(&self, identity: &str) -> Option<SessionRecord> {
        let path = self.record_path(identity);
        if !path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read session file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrite the record for a wallet using atomic write (.tmp → rename).
    pub fn save(&self, identity: &str, record: &SessionRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create session directory")?;
        let path = self.record_path(identity);
        let tmp_path = path.with_extension("json.tmp");
        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize session record")?;
        std::fs::write(&tmp_path, content).context("Failed to write temp session file")?;
        std::fs::rename(&tmp_path, &path).context("Failed to rename temp session file")?;
        debug!("Persisted session for {identity}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const IDENTITY: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_load_nonexistent_returns_none() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load(IDENTITY).is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let record = SessionRecord::new(1_700_000_000, 5.0, 0.1);
        store.save(IDENTITY, &record).unwrap();

        let loaded = store.load(IDENTITY).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_save_overwrites_whole_document() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        store
            .save(IDENTITY, &SessionRecord::new(1, 5.0, 0.1))
            .unwrap();
        store
            .save(IDENTITY, &SessionRecord::new(1, 5.2, 0.1))
            .unwrap();

        let loaded = store.load(IDENTITY).unwrap();
        assert!((loaded.earnings.total - 5.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_corrupt_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        std::fs::create_dir_all(dir.path().join("session")).unwrap();
        std::fs::write(store.record_path(IDENTITY), "{not json").unwrap();

        assert!(store.load(IDENTITY).is_none());
    }

    #[test]
    fn test_records_are_keyed_by_identity() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let other = "0x2222222222222222222222222222222222222222";

        store
            .save(IDENTITY, &SessionRecord::new(1, 1.0, 0.0))
            .unwrap();
        store.save(other, &SessionRecord::new(2, 2.0, 0.0)).unwrap();

        assert!((store.load(IDENTITY).unwrap().earnings.total - 1.0).abs() < f64::EPSILON);
        assert!((store.load(other).unwrap().earnings.total - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_file_shape_on_disk() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        store
            .save(IDENTITY, &SessionRecord::new(1_700_000_000, 5.0, 0.25))
            .unwrap();

        let raw = std::fs::read_to_string(store.record_path(IDENTITY)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["startTime"], 1_700_000_000);
        assert_eq!(json["earnings"]["total"], 5.0);
        assert_eq!(json["referralBonus"], 0.25);
    }
}
