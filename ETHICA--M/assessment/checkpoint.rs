use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::state::AssessmentState;

/// Durable JSON snapshots of pipeline state. One file per save, named
/// `state_{workflow_id}_{timestamp}.json`, so every run leaves an ordered
/// trail and any snapshot can seed a resumed run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    directory: PathBuf,
}

impl CheckpointStore {
    /// Creates a store rooted at the given directory, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .with_context(|| format!("creating checkpoint directory {}", directory.display()))?;
        Ok(Self { directory })
    }

    /// Snapshot directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persists the full state as a fresh snapshot file and returns its path.
    pub fn save(&self, state: &AssessmentState) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let path = self
            .directory
            .join(format!("state_{}_{stamp}.json", state.workflow_id));
        let json = serde_json::to_string_pretty(state).context("serializing state snapshot")?;
        fs::write(&path, json)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        Ok(path)
    }

    /// Loads a snapshot from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<AssessmentState> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        Ok(state)
    }

    /// Most recent snapshot for one workflow, if any. Snapshot names sort
    /// chronologically, so the lexicographic maximum is the latest.
    pub fn latest(&self, workflow_id: Uuid) -> Result<Option<PathBuf>> {
        let prefix = format!("state_{workflow_id}_");
        let mut newest: Option<PathBuf> = None;
        for entry in fs::read_dir(&self.directory)
            .with_context(|| format!("listing {}", self.directory.display()))?
        {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            if newest
                .as_ref()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .is_none_or(|current| name > current)
            {
                newest = Some(path);
            }
        }
        Ok(newest)
    }

    /// All snapshot paths in the store, newest first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.directory)
            .with_context(|| format!("listing {}", self.directory.display()))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("state_") && name.ends_with(".json"))
            })
            .collect();
        paths.sort();
        paths.reverse();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethica_evidence::store::Framework;
    use crate::state::{StageText, StageUpdate};
    use tempfile::tempdir;

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state
            .merge(StageUpdate {
                service_profile: Some(StageText::generated("profile")),
                risk_keywords: Some(vec!["bias".into()]),
                ..StageUpdate::default()
            })
            .unwrap();
        let path = store.save(&state).unwrap();
        let loaded = CheckpointStore::load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn latest_picks_the_newest_snapshot() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let mut state = AssessmentState::new("Chatbot X", Framework::OecdAiPrinciples);
        store.save(&state).unwrap();
        state
            .merge(StageUpdate {
                criteria_brief: Some(StageText::retrieved("brief")),
                ..StageUpdate::default()
            })
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.save(&state).unwrap();
        assert_eq!(store.latest(state.workflow_id).unwrap(), Some(second));
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn repeated_saves_are_additive_and_consistent() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let state = AssessmentState::new("Chatbot X", Framework::UnescoAiEthics);
        let first = store.save(&state).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.save(&state).unwrap();
        assert_ne!(first, second);
        assert_eq!(CheckpointStore::load(&second).unwrap(), state);
    }
}
