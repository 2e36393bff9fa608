use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::draw::DrawRecord;

/// Owns the persisted draw history and its backup directory.
///
/// Reads fail soft (a missing or corrupt history must never block ingestion
/// of new draws); writes are fatal when they fail, since silently dropping a
/// save would falsely report success to the caller.
pub struct HistoryStore {
    data_path: PathBuf,
    backup_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(data_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Loads the persisted history, degrading to an empty one on any read or
    /// parse failure. Records whose round could not be normalized to a
    /// positive integer are dropped here so the merge logic only ever sees
    /// integer-typed rounds.
    pub fn load(&self) -> Vec<DrawRecord> {
        let raw = match fs::read_to_string(&self.data_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "could not read {}: {err}; starting with empty history",
                    self.data_path.display()
                );
                return Vec::new();
            }
        };
        let records: Vec<DrawRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    "could not parse {}: {err}; starting with empty history",
                    self.data_path.display()
                );
                return Vec::new();
            }
        };
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            if record.round == 0 {
                warn!("dropping stored record with unparseable round");
                continue;
            }
            out.push(record);
        }
        out
    }

    /// Serializes the full history, descending by round, overwriting any
    /// previous content. Parent directories are created as needed.
    pub fn save(&self, history: &[DrawRecord]) -> Result<()> {
        if let Some(parent) = self.data_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating data directory: {}", parent.display()))?;
        }
        let mut sorted = history.to_vec();
        sorted.sort_by(|a, b| b.round.cmp(&a.round));
        let json = serde_json::to_string_pretty(&sorted)?;
        fs::write(&self.data_path, json)
            .with_context(|| format!("failed writing history: {}", self.data_path.display()))
    }

    /// Copies the current data file, unmodified, into the backup directory
    /// under a timestamped name. Returns `None` when there is nothing to back
    /// up. Backups are write-only from the reconciler's perspective.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.data_path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(&self.backup_dir).with_context(|| {
            format!(
                "failed creating backup directory: {}",
                self.backup_dir.display()
            )
        })?;
        let stamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let backup_path = self.backup_dir.join(format!("lotto-data-{stamp}.json"));
        fs::copy(&self.data_path, &backup_path)
            .with_context(|| format!("failed writing backup: {}", backup_path.display()))?;
        Ok(Some(backup_path))
    }
}

/// Highest round present, or 0 for an empty history.
pub fn latest_round(history: &[DrawRecord]) -> u32 {
    history.iter().map(|r| r.round).max().unwrap_or(0)
}

/// Record count of a persisted history file. Used only by the advisory
/// post-save loss check.
pub fn count_records(path: &Path) -> Result<usize> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    let records: Vec<DrawRecord> =
        serde_json::from_str(&raw).with_context(|| format!("failed parsing {}", path.display()))?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn record(round: u32) -> DrawRecord {
        DrawRecord {
            round,
            numbers: vec![3, 11, 15, 29, 35, 44],
            bonus_number: 10,
            first_prize: 2_000_000_000,
            first_winners: 12,
            draw_date: "2025년 04월 26일".to_string(),
        }
    }

    fn store(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(
            dir.path().join("data/lotto-data.json"),
            dir.path().join("data/backups"),
        )
    }

    #[test]
    fn save_then_load_round_trips_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&[record(1170), record(1172), record(1171)])
            .unwrap();
        let loaded = store.load();
        let rounds: Vec<u32> = loaded.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1172, 1171, 1170]);
        assert_eq!(loaded[0], record(1172));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.data_path().parent().unwrap()).unwrap();
        fs::write(store.data_path(), "not json {").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn string_rounds_are_normalized_at_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.data_path().parent().unwrap()).unwrap();
        let raw = r#"[
            {"round": "1171", "numbers": [3, 11, 15, 29, 35, 44], "bonusNumber": 10,
             "firstPrize": 1, "firstWinners": 1, "drawDate": "d"},
            {"round": "garbage", "numbers": [3, 11, 15, 29, 35, 44], "bonusNumber": 10,
             "firstPrize": 1, "firstWinners": 1, "drawDate": "d"}
        ]"#;
        fs::write(store.data_path(), raw).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].round, 1171);
    }

    #[test]
    fn backup_copies_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&[record(1172)]).unwrap();
        let path = store.backup().unwrap().expect("backup path");
        assert_eq!(count_records(&path).unwrap(), 1);
        let original = fs::read_to_string(store.data_path()).unwrap();
        let copied = fs::read_to_string(&path).unwrap();
        assert_eq!(original, copied);
    }

    #[test]
    fn backup_of_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).backup().unwrap().is_none());
    }

    #[test]
    fn latest_round_handles_empty_history() {
        assert_eq!(latest_round(&[]), 0);
        assert_eq!(latest_round(&[record(1170), record(1172)]), 1172);
    }
}
