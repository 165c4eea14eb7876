use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::world::ColonySnapshot;

/// Snapshot as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub written_at: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: ColonySnapshot,
}

/// Writes `<dir>/<scenario>/tick_NNNNNN.json` every `interval` ticks.
pub struct SnapshotWriter {
    dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn is_due(&self, tick: u64) -> bool {
        self.interval > 0 && tick > 0 && tick % self.interval == 0
    }

    pub fn maybe_write(&self, snapshot: &ColonySnapshot) -> Result<Option<PathBuf>> {
        if !self.is_due(snapshot.tick) {
            return Ok(None);
        }
        self.write(snapshot).map(Some)
    }

    pub fn write(&self, snapshot: &ColonySnapshot) -> Result<PathBuf> {
        let dir = self.dir.join(&snapshot.scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{:06}.json", snapshot.tick));
        let file = SnapshotFile {
            written_at: Utc::now(),
            snapshot: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        tracing::debug!("snapshot written to {}", path.display());
        Ok(path)
    }
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<SnapshotFile> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let file = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    Ok(file)
}

/// Snapshot files of one scenario, oldest tick first.
pub fn list_snapshots(dir: impl AsRef<Path>, scenario: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref().join(scenario);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_snapshot = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("tick_") && name.ends_with(".json"));
        if is_snapshot {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Ledger, PersistedState};

    fn snapshot(tick: u64) -> ColonySnapshot {
        ColonySnapshot {
            scenario: "unit".into(),
            tick,
            total_workers: 0,
            ledger: Ledger::default(),
            zones: Vec::new(),
            persisted: PersistedState::default(),
        }
    }

    #[test]
    fn writes_only_on_interval() {
        let temp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp.path(), 5);
        assert!(writer.maybe_write(&snapshot(0)).unwrap().is_none());
        assert!(writer.maybe_write(&snapshot(3)).unwrap().is_none());
        let path = writer.maybe_write(&snapshot(5)).unwrap().unwrap();
        assert!(path.ends_with("unit/tick_000005.json"));

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.snapshot.tick, 5);
        assert_eq!(list_snapshots(temp.path(), "unit").unwrap(), vec![path]);
    }

    #[test]
    fn zero_interval_disables_writing() {
        let temp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp.path(), 0);
        assert!(writer.maybe_write(&snapshot(10)).unwrap().is_none());
        assert!(list_snapshots(temp.path(), "unit").unwrap().is_empty());
    }
}
