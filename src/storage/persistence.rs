//! Persistence for state that lives outside Tantivy: the in-memory Fuzzy
//! Index snapshot. Tantivy owns durability for everything else (symbols,
//! files, BM25 documents, metadata counters) via its own segment files.
//!
//! Grounded in the teacher's `storage/persistence.rs`: write to a temp file,
//! then rename, so a crash mid-write never leaves a half-written snapshot.

use std::fs;
use std::path::PathBuf;

use crate::error::{ErrorContext, IndexError, IndexResult};
use crate::fuzzy::FuzzyIndex;

pub struct FuzzySnapshot {
    base_path: PathBuf,
}

impl FuzzySnapshot {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.base_path.join("fuzzy.json")
    }

    #[must_use = "snapshot save errors should be handled to ensure data is persisted"]
    pub fn save(&self, index: &FuzzyIndex) -> IndexResult<()> {
        fs::create_dir_all(&self.base_path).map_err(|e| IndexError::FileWrite {
            path: self.base_path.clone(),
            source: e,
        })?;

        let json = serde_json::to_vec(index.entries()).map_err(|e| IndexError::PersistenceError {
            path: self.snapshot_path(),
            source: Box::new(e),
        })?;

        let temp_path = self.snapshot_path().with_extension("tmp");
        fs::write(&temp_path, json).map_err(|e| IndexError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, self.snapshot_path()).map_err(|e| IndexError::FileWrite {
            path: self.snapshot_path(),
            source: e,
        })?;

        Ok(())
    }

    #[must_use = "load errors should be handled appropriately"]
    pub fn load(&self) -> IndexResult<FuzzyIndex> {
        let data = fs::read(self.snapshot_path()).with_path(&self.snapshot_path())?;
        let entries = serde_json::from_slice(&data).map_err(|e| IndexError::LoadError {
            path: self.snapshot_path(),
            source: Box::new(e),
        })?;
        Ok(FuzzyIndex::from_entries(entries))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    pub fn clear(&self) -> std::io::Result<()> {
        if self.exists() {
            fs::remove_file(self.snapshot_path())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FuzzyEntry;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let snapshot = FuzzySnapshot::new(dir.path().to_path_buf());

        let mut index = FuzzyIndex::new();
        index.insert(FuzzyEntry {
            name: "parse_json".to_string(),
            file: "src/parser.rs".to_string(),
            line: 10,
            metadata: None,
        });

        snapshot.save(&index).unwrap();
        assert!(snapshot.exists());

        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded.entries().len(), 1);
    }

    #[test]
    fn clear_removes_snapshot_file() {
        let dir = TempDir::new().unwrap();
        let snapshot = FuzzySnapshot::new(dir.path().to_path_buf());
        let index = FuzzyIndex::new();
        snapshot.save(&index).unwrap();
        snapshot.clear().unwrap();
        assert!(!snapshot.exists());
    }
}
