//! Data model shared by the Storage Layer, Index Engine, and Query Optimizer.
//!
//! Mirrors §3 of the design: a `Repository` owns `File`s, a `File` exclusively
//! owns its `Symbol`s and `Reference`s, and the Storage Layer owns all of it.

use crate::types::{FileId, RepositoryId, SymbolId, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub path: String,
    pub name: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub repository_id: RepositoryId,
    pub path: String,
    pub relative_path: String,
    pub language: String,
    pub size: u64,
    pub hash: String,
    pub mtime: u64,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub file_id: FileId,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: Option<u32>,
    pub end_col: Option<u32>,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl Symbol {
    pub fn new(
        id: SymbolId,
        file_id: FileId,
        name: impl Into<String>,
        kind: SymbolKind,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            id,
            file_id,
            name: name.into(),
            kind,
            start_line,
            end_line,
            start_col: None,
            end_col: None,
            signature: None,
            docstring: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub file_id: FileId,
    pub name: String,
    pub line: u32,
    pub column: Option<u32>,
}

/// One searchable unit backed by the BM25 / full-text engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Document {
    pub doc_key: String,
    pub content: String,
    pub symbols: String,
    pub language: String,
    pub metadata: HashMap<String, String>,
}

/// `(name, file path, line, metadata?)` entry kept in the in-memory fuzzy index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyEntry {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    IndexFile,
    IndexDirectory,
    Reindex,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexTask {
    pub id: String,
    pub target_path: String,
    pub kind: TaskKind,
    pub priority: i32,
    pub submitted_seq: u64,
    pub state: TaskState,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub started_at_epoch_ms: Option<u64>,
    /// EMA of files/second.
    pub throughput: f64,
}

impl IndexProgress {
    /// Updates the throughput EMA after one more file finishes. `alpha` of
    /// 0.3 mirrors the smoothing used for the optimizer's response-time EMA.
    pub fn record_file(&mut self, elapsed_secs: f64, alpha: f64) {
        if elapsed_secs <= 0.0 {
            return;
        }
        let instantaneous = 1.0 / elapsed_secs;
        self.throughput = if self.throughput == 0.0 {
            instantaneous
        } else {
            alpha * instantaneous + (1.0 - alpha) * self.throughput
        };
    }
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_builder_sets_optional_fields() {
        let sym = Symbol::new(
            SymbolId::new(1).unwrap(),
            FileId::new(1).unwrap(),
            "foo",
            SymbolKind::new("function"),
            1,
            3,
        )
        .with_signature("fn foo(a, b)")
        .with_doc("adds two numbers");
        assert_eq!(sym.signature.as_deref(), Some("fn foo(a, b)"));
        assert_eq!(sym.docstring.as_deref(), Some("adds two numbers"));
    }

    #[test]
    fn progress_ema_tracks_throughput() {
        let mut progress = IndexProgress::default();
        progress.record_file(1.0, 0.3);
        assert!((progress.throughput - 1.0).abs() < 1e-9);
        progress.record_file(0.5, 0.3);
        assert!(progress.throughput > 1.0);
    }
}
