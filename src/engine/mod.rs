//! Index Engine: orchestrates indexing over a `rayon` worker pool, owns the
//! task queue, and tracks progress — the component the CLI and Hybrid Search
//! both sit on top of.

pub mod task;
pub mod walker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::bm25::Bm25Index;
use crate::context::IndexContext;
use crate::error::{IndexError, IndexResult};
use crate::extractor::ExtractorRegistry;
use crate::fuzzy::FuzzyIndex;
use crate::model::{Bm25Document, File, IndexProgress, Symbol, TaskKind};
use crate::types::{FileId, RepositoryId, SymbolId};
use task::TaskQueue;
use walker::FileWalker;

/// Result of indexing a single file; mirrors spec §4.E's `IndexResult`.
#[derive(Debug, Clone)]
pub struct FileIndexResult {
    pub success: bool,
    pub file_path: String,
    pub language: String,
    pub symbols_count: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of indexing a whole directory; mirrors spec §4.E's `BatchResult`.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub force_reindex: bool,
    pub max_file_size: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            force_reindex: false,
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub total_files: u64,
    pub total_symbols: u64,
    pub total_references: u64,
    pub index_size_mb: f64,
}

/// Per-file next symbol id counter, kept alongside the fuzzy index in memory
/// and persisted through the Storage Layer's `metadata` rows.
struct IdAllocator {
    next_file_id: AtomicU64,
    next_symbol_id: AtomicU64,
}

impl IdAllocator {
    fn new(next_file_id: u64, next_symbol_id: u64) -> Self {
        Self {
            next_file_id: AtomicU64::new(next_file_id.max(1)),
            next_symbol_id: AtomicU64::new(next_symbol_id.max(1)),
        }
    }

    fn alloc_file(&self) -> IndexResult<FileId> {
        let value = self.next_file_id.fetch_add(1, AtomicOrdering::SeqCst);
        FileId::new(value as u32).ok_or(IndexError::FileIdExhausted)
    }

    fn alloc_symbol(&self) -> IndexResult<SymbolId> {
        let value = self.next_symbol_id.fetch_add(1, AtomicOrdering::SeqCst);
        SymbolId::new(value as u32).ok_or(IndexError::SymbolIdExhausted)
    }
}

pub struct IndexEngine {
    ctx: IndexContext,
    extractors: Arc<ExtractorRegistry>,
    fuzzy: Arc<Mutex<FuzzyIndex>>,
    queue: Arc<Mutex<TaskQueue>>,
    progress: Arc<Mutex<IndexProgress>>,
    ids: Arc<IdAllocator>,
    repository_id: RepositoryId,
    next_task_seq: AtomicU64,
}

impl IndexEngine {
    pub fn new(ctx: IndexContext, fuzzy: FuzzyIndex, repository_id: RepositoryId) -> Self {
        let queue_capacity = ctx.settings.engine.queue_capacity;
        let coalesce_window = ctx.settings.engine.coalesce_window;
        let next_file_id = ctx
            .storage
            .get_metadata("file_counter")
            .ok()
            .flatten()
            .unwrap_or(0)
            + 1;
        let next_symbol_id = ctx
            .storage
            .get_metadata("symbol_counter")
            .ok()
            .flatten()
            .unwrap_or(0)
            + 1;

        Self {
            ctx,
            extractors: Arc::new(ExtractorRegistry::with_defaults()),
            fuzzy: Arc::new(Mutex::new(fuzzy)),
            queue: Arc::new(Mutex::new(TaskQueue::new(queue_capacity, coalesce_window))),
            progress: Arc::new(Mutex::new(IndexProgress::default())),
            ids: Arc::new(IdAllocator::new(next_file_id, next_symbol_id)),
            repository_id,
            next_task_seq: AtomicU64::new(0),
        }
    }

    pub fn progress(&self) -> IndexProgress {
        self.progress.lock().clone()
    }

    pub fn fuzzy_index(&self) -> Arc<Mutex<FuzzyIndex>> {
        self.fuzzy.clone()
    }

    /// Schedules a reindex and returns its task id; duplicate scheduling for
    /// an already-queued path returns the existing task's id (coalesced).
    pub fn schedule_reindex(&self, path: impl Into<PathBuf>, priority: i32) -> IndexResult<String> {
        let path = path.into();
        let id = format!(
            "task-{}",
            self.next_task_seq.fetch_add(1, AtomicOrdering::SeqCst)
        );
        let queued = self.queue.lock().submit(
            path.to_string_lossy().to_string(),
            TaskKind::Reindex,
            priority,
            id.clone(),
        )?;
        Ok(if queued { id } else { "coalesced".to_string() })
    }

    pub fn get_pending_tasks(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn index_status(&self) -> IndexResult<IndexStatus> {
        let total_files = self
            .ctx
            .storage
            .get_metadata("file_counter")
            .map_err(IndexError::from)?
            .unwrap_or(0);
        let total_symbols = self
            .ctx
            .storage
            .get_metadata("symbol_counter")
            .map_err(IndexError::from)?
            .unwrap_or(0);
        let size_bytes = dir_size(self.ctx.storage.path()).unwrap_or(0);
        let stats = self.ctx.storage.get_statistics().map_err(IndexError::from)?;
        Ok(IndexStatus {
            total_files,
            total_symbols,
            total_references: stats.reference_count,
            index_size_mb: size_bytes as f64 / (1024.0 * 1024.0),
        })
    }

    /// Indexes one file. Skips re-extraction when the stored hash is
    /// unchanged and `options.force_reindex` is false.
    pub fn index_file(&self, path: &Path, options: &IndexOptions) -> IndexResult<FileIndexResult> {
        let start = Instant::now();
        let file_path = path.to_string_lossy().to_string();

        let content = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                return Ok(FileIndexResult {
                    success: false,
                    file_path,
                    language: String::new(),
                    symbols_count: 0,
                    duration_ms: elapsed_ms(start),
                    error: Some(e.to_string()),
                });
            }
        };

        if content.len() as u64 > options.max_file_size {
            return Ok(FileIndexResult {
                success: false,
                file_path,
                language: String::new(),
                symbols_count: 0,
                duration_ms: elapsed_ms(start),
                error: Some("skipped: exceeds max_file_size".to_string()),
            });
        }

        let hash = hash_content(&content);

        let Some(extractor) = self.extractors.find_for(path) else {
            return Ok(FileIndexResult {
                success: false,
                file_path,
                language: String::new(),
                symbols_count: 0,
                duration_ms: elapsed_ms(start),
                error: Some("unsupported".to_string()),
            });
        };

        if !options.force_reindex {
            if let Ok(existing) = self.ctx.storage.get_metadata(&format!("hash:{file_path}")) {
                if let Some(existing) = existing {
                    if existing == hash_to_u64(&hash) {
                        return Ok(FileIndexResult {
                            success: true,
                            file_path,
                            language: extractor.language_name().to_string(),
                            symbols_count: 0,
                            duration_ms: elapsed_ms(start),
                            error: None,
                        });
                    }
                }
            }
        }

        let extracted = match extractor.index_file(path, &content) {
            Ok(extracted) => extracted,
            Err(e) => {
                return Ok(FileIndexResult {
                    success: false,
                    file_path,
                    language: extractor.language_name().to_string(),
                    symbols_count: 0,
                    duration_ms: elapsed_ms(start),
                    error: Some(e.to_string()),
                });
            }
        };

        let result = self.write_file_transaction(path, &file_path, &content, &hash, &extracted);
        let elapsed = elapsed_ms(start);

        {
            let mut progress = self.progress.lock();
            progress.completed += 1;
            progress.record_file(elapsed as f64 / 1000.0, self.ctx.settings.engine.progress_alpha);
            if result.is_err() {
                progress.failed += 1;
            }
        }

        match result {
            Ok(symbols_count) => Ok(FileIndexResult {
                success: true,
                file_path,
                language: extracted.language,
                symbols_count,
                duration_ms: elapsed,
                error: None,
            }),
            Err(e) => Ok(FileIndexResult {
                success: false,
                file_path,
                language: extracted.language,
                symbols_count: 0,
                duration_ms: elapsed,
                error: Some(e.to_string()),
            }),
        }
    }

    /// Single write transaction: delete the file's owned documents, upsert
    /// the File row, insert symbols, and update the BM25/fuzzy indices.
    fn write_file_transaction(
        &self,
        path: &Path,
        file_path: &str,
        content: &str,
        hash: &str,
        extracted: &crate::extractor::ExtractedFile,
    ) -> IndexResult<usize> {
        self.ctx.storage.remove_file_documents(file_path).map_err(IndexError::from)?;
        self.ctx.storage.start_batch().map_err(IndexError::from)?;

        let file_id = self.ids.alloc_file()?;
        let file = File {
            id: file_id,
            repository_id: self.repository_id,
            path: file_path.to_string(),
            relative_path: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            language: extracted.language.clone(),
            size: content.len() as u64,
            hash: hash.to_string(),
            mtime: crate::model::now_epoch_ms(),
            content: None,
        };
        self.ctx.storage.add_file(&file).map_err(IndexError::from)?;

        let mut symbol_names = Vec::with_capacity(extracted.symbols.len());
        for extracted_symbol in &extracted.symbols {
            let symbol_id = self.ids.alloc_symbol()?;
            let symbol = Symbol::new(
                symbol_id,
                file_id,
                extracted_symbol.name.clone(),
                extracted_symbol.kind.clone(),
                extracted_symbol.line,
                extracted_symbol.end_line.unwrap_or(extracted_symbol.line),
            );
            let symbol = match &extracted_symbol.signature {
                Some(sig) => symbol.with_signature(sig.clone()),
                None => symbol,
            };
            let symbol = match extracted_symbol.metadata.get("doc") {
                Some(doc) => symbol.with_doc(doc.clone()),
                None => symbol,
            };
            self.ctx.storage.add_symbol(&symbol, file_path).map_err(IndexError::from)?;
            symbol_names.push(extracted_symbol.name.clone());
        }

        for extracted_symbol in &extracted.symbols {
            for line in find_word_occurrences(content, &extracted_symbol.name) {
                self.ctx
                    .storage
                    .add_reference(file_id, file_path, &extracted_symbol.name, line)
                    .map_err(IndexError::from)?;
            }
        }

        let bm25_doc = Bm25Document {
            doc_key: file_path.to_string(),
            content: content.to_string(),
            symbols: symbol_names.join(" "),
            language: extracted.language.clone(),
            metadata: HashMap::new(),
        };
        let bm25 = Bm25Index::new(
            &self.ctx.storage,
            self.ctx.settings.indexing.bm25_k1,
            self.ctx.settings.indexing.bm25_b,
        );
        bm25.add_document(&bm25_doc).map_err(IndexError::from)?;

        self.ctx
            .storage
            .set_metadata(&format!("hash:{file_path}"), hash_to_u64(hash))
            .map_err(IndexError::from)?;
        self.ctx
            .storage
            .set_metadata("file_counter", file_id.value() as u64)
            .map_err(IndexError::from)?;
        self.ctx.storage.commit_batch().map_err(IndexError::from)?;

        {
            let mut fuzzy = self.fuzzy.lock();
            fuzzy.remove_file(file_path);
            fuzzy.add_file(file_path, content);
            for extracted_symbol in &extracted.symbols {
                fuzzy.insert(crate::model::FuzzyEntry {
                    name: extracted_symbol.name.clone(),
                    file: file_path.to_string(),
                    line: extracted_symbol.line,
                    metadata: None,
                });
            }
        }

        Ok(extracted.symbols.len())
    }

    /// Walks `root`, indexing every matched file in parallel (bounded by
    /// `engine.parallel_threads`). Per-file failures are aggregated, never
    /// propagated — a batch never raises.
    pub fn index_directory(&self, root: &Path, options: &IndexOptions) -> IndexResult<BatchResult> {
        let start = Instant::now();
        let walker = FileWalker::new(self.ctx.settings.clone());
        let files: Vec<PathBuf> = walker.walk(root).collect();

        {
            let mut progress = self.progress.lock();
            progress.total = files.len();
            progress.completed = 0;
            progress.failed = 0;
            progress.started_at_epoch_ms = Some(crate::model::now_epoch_ms());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.settings.engine.parallel_threads)
            .build()
            .map_err(|e| IndexError::General(e.to_string()))?;

        let results: Vec<FileIndexResult> = pool.install(|| {
            use rayon::prelude::*;
            files
                .par_iter()
                .map(|path| {
                    self.index_file(path, options).unwrap_or_else(|e| FileIndexResult {
                        success: false,
                        file_path: path.to_string_lossy().to_string(),
                        language: String::new(),
                        symbols_count: 0,
                        duration_ms: 0,
                        error: Some(e.to_string()),
                    })
                })
                .collect()
        });

        let mut batch = BatchResult {
            total_files: results.len(),
            ..Default::default()
        };
        for r in &results {
            if r.success {
                batch.successful += 1;
            } else {
                batch.failed += 1;
                if let Some(err) = &r.error {
                    batch.errors.push(format!("{}: {}", r.file_path, err));
                }
            }
        }
        batch.total_duration_ms = elapsed_ms(start);
        Ok(batch)
    }
}

/// Word-boundary occurrences of `name` in `content`, one entry per line it
/// appears on. The extractors themselves report only definitions; this
/// textual scan is what populates the `reference` table until a language
/// plugin grows real call-graph resolution.
fn find_word_occurrences(content: &str, name: &str) -> Vec<u32> {
    if name.is_empty() {
        return Vec::new();
    }
    let pattern = format!(r"\b{}\b", regex::escape(name));
    let Ok(re) = regex::Regex::new(&pattern) else {
        return Vec::new();
    };
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| re.is_match(line))
        .map(|(i, _)| (i + 1) as u32)
        .collect()
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Folds the SHA-256 hex digest down to a u64 for storage as a Tantivy
/// metadata value; full digest is what's stored/compared for archives.
fn hash_to_u64(hash: &str) -> u64 {
    u64::from_str_radix(&hash[..16], 16).unwrap_or(0)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                total += dir_size(&entry.path())?;
            } else {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::storage::DocumentIndex;
    use tempfile::TempDir;

    fn make_engine(dir: &TempDir) -> IndexEngine {
        let storage = DocumentIndex::open(dir.path().join("index")).unwrap();
        let ctx = IndexContext::new(Settings::default(), storage);
        IndexEngine::new(ctx, FuzzyIndex::new(), RepositoryId::new(1).unwrap())
    }

    #[test]
    fn index_file_extracts_symbols_and_updates_progress() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("lib.rs");
        std::fs::write(&file_path, "fn add(a: i32, b: i32) -> i32 { a + b }\n").unwrap();

        let engine = make_engine(&dir);
        let result = engine.index_file(&file_path, &IndexOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.symbols_count, 1);
        assert_eq!(engine.progress().completed, 1);
    }

    #[test]
    fn unchanged_hash_is_skipped_without_force_reindex() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("lib.rs");
        std::fs::write(&file_path, "fn add() {}\n").unwrap();

        let engine = make_engine(&dir);
        let options = IndexOptions::default();
        let first = engine.index_file(&file_path, &options).unwrap();
        assert_eq!(first.symbols_count, 1);

        let second = engine.index_file(&file_path, &options).unwrap();
        assert!(second.success);
        assert_eq!(second.symbols_count, 0);
    }

    #[test]
    fn index_directory_aggregates_results_without_raising() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn b() {}\n").unwrap();

        let engine = make_engine(&dir);
        let settings = {
            let mut s = Settings::default();
            s.languages.get_mut("rust").unwrap().enabled = true;
            s
        };
        let storage = DocumentIndex::open(dir.path().join("idx2")).unwrap();
        let ctx = IndexContext::new(settings, storage);
        let engine2 = IndexEngine::new(ctx, FuzzyIndex::new(), RepositoryId::new(1).unwrap());
        let _ = engine;

        let batch = engine2
            .index_directory(dir.path(), &IndexOptions::default())
            .unwrap();
        assert_eq!(batch.total_files, 2);
        assert_eq!(batch.successful, 2);
    }

    #[test]
    fn indexing_a_file_persists_references_to_its_own_symbols() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("lib.rs");
        std::fs::write(
            &file_path,
            "fn helper() {}\n\nfn caller() {\n    helper();\n}\n",
        )
        .unwrap();

        let engine = make_engine(&dir);
        engine.index_file(&file_path, &IndexOptions::default()).unwrap();

        let refs = engine.ctx.storage.find_references("helper").unwrap();
        assert!(refs.iter().any(|r| r.line == 4));
    }

    #[test]
    fn schedule_reindex_coalesces_duplicate_paths() {
        let dir = TempDir::new().unwrap();
        let engine = make_engine(&dir);
        let id1 = engine.schedule_reindex("src/lib.rs", 1).unwrap();
        let id2 = engine.schedule_reindex("src/lib.rs", 1).unwrap();
        assert_ne!(id1, "coalesced");
        assert_eq!(id2, "coalesced");
        assert_eq!(engine.get_pending_tasks(), 1);
    }
}
