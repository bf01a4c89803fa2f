//! Error types for the indexing and search engine.
//!
//! Mirrors the teacher's `error.rs`: one `thiserror` enum per layer, each with
//! `recovery_suggestions()` so the CLI can print actionable advice instead of
//! a bare message.

use crate::types::{FileId, SymbolId};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for indexing operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {language} file '{path}': {reason}")]
    ParseError {
        path: PathBuf,
        language: String,
        reason: String,
    },

    #[error("Unsupported file type '{extension}' for file '{path}'")]
    UnsupportedFileType { path: PathBuf, extension: String },

    #[error("Failed to persist index to '{path}': {source}")]
    PersistenceError {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to load index from '{path}': {source}")]
    LoadError {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Symbol '{name}' not found")]
    SymbolNotFound { name: String },

    #[error("File ID {id} not found in index. It may have been removed or never indexed.")]
    FileNotFound { id: FileId },

    #[error("Failed to create file ID: maximum file count reached")]
    FileIdExhausted,

    #[error("Failed to create symbol ID: maximum symbol count reached")]
    SymbolIdExhausted,

    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("Tantivy operation failed during {operation}: {cause}")]
    TantivyError { operation: String, cause: String },

    #[error("Transaction failed after operations: {operations:?}. Cause: {cause}")]
    TransactionFailed {
        operations: Vec<String>,
        cause: String,
    },

    #[error("Internal lock was poisoned, likely due to a panic in another thread")]
    LockPoisoned,

    #[error("Index appears to be corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// The bounded task queue rejected a submission; the caller should retry
    /// or raise `engine.queue_capacity`.
    #[error("Index task queue is full (capacity {capacity}); task for '{path}' was rejected")]
    QueueFull { path: PathBuf, capacity: usize },

    /// A dense-vector embedder was requested but none is configured/reachable.
    #[error("No embedding backend is available: {reason}")]
    EmbedderUnavailable { reason: String },

    /// A reranker backend (cross-encoder or external API) could not be reached.
    #[error("Reranker '{name}' is unavailable: {reason}")]
    RerankerUnavailable { name: String, reason: String },

    /// An archive's `index_metadata.json` compatibility hash did not match
    /// the importing engine's schema/version.
    #[error(
        "Archive '{path}' is not compatible with this engine: dimension mismatch (expected {expected_dimension}, found {found_dimension}; expected hash {expected}, found {found})"
    )]
    ImportIncompatible {
        path: PathBuf,
        expected: String,
        found: String,
        expected_dimension: u32,
        found_dimension: u32,
    },

    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Recovery suggestions shown by the CLI alongside the error message.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::TantivyError { .. } => vec![
                "Run 'codex-index index build --force' to rebuild the index",
                "Check disk space and permissions in the index directory",
            ],
            Self::TransactionFailed { .. } => vec![
                "The operation was rolled back; the index is in a consistent state",
                "Retry the operation, it may succeed the second time",
            ],
            Self::LockPoisoned => vec![
                "Restart the process to clear the poisoned state",
                "If the problem persists, run 'codex-index index build --force'",
            ],
            Self::IndexCorrupted { .. } => vec![
                "Run 'codex-index index build --force' to rebuild from scratch",
                "Check for disk errors or filesystem corruption",
            ],
            Self::LoadError { .. } | Self::PersistenceError { .. } => vec![
                "The index can be rebuilt from source with 'index build --force'",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::UnsupportedFileType { .. } => {
                vec!["Only languages with a registered extractor are indexed"]
            }
            Self::QueueFull { .. } => vec![
                "Raise 'engine.queue_capacity' in the config file",
                "Wait for the current batch to drain before submitting more files",
            ],
            Self::EmbedderUnavailable { .. } => vec![
                "Hybrid search falls back to lexical-only ranking without an embedder",
            ],
            Self::RerankerUnavailable { .. } => vec![
                "Results are returned unranked by the reranker; verify network access or API credentials",
            ],
            Self::ImportIncompatible { .. } => vec![
                "The archive's embedding dimension does not match this index; rebuild the archive with 'index export' from a compatible engine version",
                "Pass --force to import anyway, or --auto-reindex to rebuild from source with the new embedding model",
            ],
            _ => vec![],
        }
    }
}

/// Errors specific to symbol extraction.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to initialize {language} extractor: {reason}")]
    ExtractorInit { language: String, reason: String },

    #[error("Failed to parse code at line {line}, column {column}: {reason}")]
    SyntaxError {
        line: u32,
        column: u32,
        reason: String,
    },

    #[error("Invalid UTF-8 in source file")]
    InvalidUtf8,

    #[error("AST exceeded the maximum traversal depth ({max_depth})")]
    RecursionLimit { max_depth: usize },
}

/// Errors specific to the Tantivy-backed storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Tantivy index error: {0}")]
    TantivyError(#[from] tantivy::TantivyError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Query parse error: {0}")]
    QueryParseError(String),

    #[error("Document not found for symbol {id}")]
    DocumentNotFound { id: SymbolId },

    #[error("Schema mismatch: expected field '{field}'")]
    SchemaMismatch { field: String },
}

pub type IndexResult<T> = Result<T, IndexError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for IndexError {
    fn from(err: StorageError) -> Self {
        IndexError::TantivyError {
            operation: "storage".to_string(),
            cause: err.to_string(),
        }
    }
}

impl From<ParseError> for IndexError {
    fn from(err: ParseError) -> Self {
        IndexError::ParseError {
            path: PathBuf::new(),
            language: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Adds context to a foreign error on its way into an `IndexError`.
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, IndexError>;
    fn with_path(self, path: &std::path::Path) -> Result<T, IndexError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::General(format!("{msg}: {e}")))
    }

    fn with_path(self, path: &std::path::Path) -> Result<T, IndexError> {
        self.map_err(|e| {
            IndexError::General(format!("Error processing '{}': {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_has_recovery_suggestions() {
        let err = IndexError::QueueFull {
            path: PathBuf::from("src/lib.rs"),
            capacity: 1024,
        };
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn storage_error_converts_into_index_error() {
        let storage_err = StorageError::DocumentNotFound {
            id: SymbolId::new(1).unwrap(),
        };
        let err: IndexError = storage_err.into();
        assert!(matches!(err, IndexError::TantivyError { .. }));
    }
}
