use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use fxhash::FxHashMap;
use jiff::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sortie_optimizer::json::types::{JsonMissionRequest, JsonSolution};
use tracing::{debug, warn};
use uuid::Uuid;

/// A stored mission: the request that produced it and its latest solution.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MissionRecord {
    pub id: Uuid,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Mission this one was replanned from
    pub parent: Option<Uuid>,

    pub request: JsonMissionRequest,
    pub solution: JsonSolution,
}

impl MissionRecord {
    pub fn new(request: JsonMissionRequest, solution: JsonSolution, parent: Option<Uuid>) -> Self {
        let now = Timestamp::now();

        MissionRecord {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            parent,
            request,
            solution,
        }
    }

    pub fn update(&mut self, solution: JsonSolution) {
        self.solution = solution;
        self.updated_at = Timestamp::now();
    }
}

fn sort_records(records: &mut [MissionRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub trait MissionStore {
    fn get(&self, id: Uuid) -> Result<Option<MissionRecord>, anyhow::Error>;

    /// Inserts or replaces the record with the same id.
    fn put(&self, record: &MissionRecord) -> Result<(), anyhow::Error>;

    /// Every record, oldest first.
    fn list(&self) -> Result<Vec<MissionRecord>, anyhow::Error>;
}

#[derive(Default)]
pub struct InMemoryMissionStore {
    records: RwLock<FxHashMap<Uuid, MissionRecord>>,
}

impl InMemoryMissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MissionStore for InMemoryMissionStore {
    fn get(&self, id: Uuid) -> Result<Option<MissionRecord>, anyhow::Error> {
        Ok(self.records.read().get(&id).cloned())
    }

    fn put(&self, record: &MissionRecord) -> Result<(), anyhow::Error> {
        self.records.write().insert(record.id, record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<MissionRecord>, anyhow::Error> {
        let mut records = self.records.read().values().cloned().collect::<Vec<_>>();
        sort_records(&mut records);
        Ok(records)
    }
}

/// One JSON file per mission, named after its id.
pub struct FileMissionStore {
    folder: PathBuf,
}

impl FileMissionStore {
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder)?;

        Ok(FileMissionStore { folder })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.folder.join(format!("{id}.json"))
    }

    fn read(path: &Path) -> Result<MissionRecord, anyhow::Error> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl MissionStore for FileMissionStore {
    fn get(&self, id: Uuid) -> Result<Option<MissionRecord>, anyhow::Error> {
        let path = self.path(id);

        if !path.is_file() {
            return Ok(None);
        }

        Self::read(&path).map(Some)
    }

    fn put(&self, record: &MissionRecord) -> Result<(), anyhow::Error> {
        let path = self.path(record.id);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, record)?;
        writer.flush()?;

        debug!(path = %path.display(), "Stored mission");

        Ok(())
    }

    fn list(&self) -> Result<Vec<MissionRecord>, anyhow::Error> {
        let mut records = Vec::new();

        for entry in std::fs::read_dir(&self.folder)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|extension| extension != "json") {
                continue;
            }

            match Self::read(&path) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path.display(), "Skipping unreadable mission: {err}"),
            }
        }

        sort_records(&mut records);

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use sortie_optimizer::solver::{solve, solver_params::SolverParams};

    use super::*;
    use crate::test_utils::create_test_request;

    fn record() -> MissionRecord {
        let request = create_test_request();
        let (environment, vehicles) = request.clone().into_parts();
        let solution = solve(environment, vehicles, &SolverParams::default()).unwrap();

        MissionRecord::new(request, JsonSolution::from(&solution), None)
    }

    fn exercise(store: &impl MissionStore) {
        let first = record();
        let mut second = record();
        second.created_at = first.created_at + jiff::SignedDuration::from_secs(1);

        store.put(&second).unwrap();
        store.put(&first).unwrap();

        let loaded = store.get(first.id).unwrap().unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(loaded.solution.total_score, first.solution.total_score);
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());

        let ids = store
            .list()
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![first.id, second.id]);

        let mut updated = loaded;
        updated.update(updated.solution.clone());
        store.put(&updated).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_in_memory_store() {
        exercise(&InMemoryMissionStore::new());
    }

    #[test]
    fn test_file_store() {
        let folder = std::env::temp_dir().join(format!("sortie-missions-{}", Uuid::new_v4()));
        let store = FileMissionStore::new(&folder).unwrap();

        exercise(&store);
        std::fs::write(folder.join("notes.txt"), "ignored").unwrap();
        assert_eq!(store.list().unwrap().len(), 2);

        std::fs::remove_dir_all(store.folder()).unwrap();
    }
}
