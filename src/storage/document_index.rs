//! The Storage Layer: a single Tantivy index backing symbol lookup, BM25
//! full-text search, and file/repository/metadata bookkeeping.
//!
//! Grounded directly in the teacher's `storage/tantivy.rs`: one schema with a
//! `doc_type` discriminator, a batch writer guarded by a mutex, and a
//! manually-reloaded reader so readers never block a concurrent writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::error::{StorageError, StorageResult};
use crate::model::{Bm25Document, File, Repository, Symbol};
use crate::storage::schema::{IndexSchema, doc_type};
use crate::types::{FileId, RepositoryId, SymbolId, SymbolKind};

/// One ranked hit returned from [`DocumentIndex::search_symbols`].
#[derive(Debug, Clone)]
pub struct SymbolHit {
    pub symbol_id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub line: u32,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub score: f32,
}

/// One ranked hit returned from [`DocumentIndex::search_fulltext`].
#[derive(Debug, Clone)]
pub struct FullTextHit {
    pub doc_key: String,
    pub score: f32,
}

/// One occurrence returned from [`DocumentIndex::find_references`].
#[derive(Debug, Clone)]
pub struct ReferenceHit {
    pub file_path: String,
    pub name: String,
    pub line: u32,
}

/// Row counts across the six logical tables, for `index status` reporting.
#[derive(Debug, Clone, Default)]
pub struct IndexStatistics {
    pub repository_count: u64,
    pub file_count: u64,
    pub symbol_count: u64,
    pub reference_count: u64,
    pub bm25_document_count: u64,
}


pub struct DocumentIndex {
    index: Index,
    reader: IndexReader,
    schema: IndexSchema,
    index_path: PathBuf,
    writer: Mutex<Option<IndexWriter<TantivyDocument>>>,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("index_path", &self.index_path)
            .finish()
    }
}

impl DocumentIndex {
    pub fn open(index_path: impl AsRef<Path>) -> StorageResult<Self> {
        let index_path = index_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&index_path).map_err(|e| {
            StorageError::QueryParseError(format!("cannot create index dir: {e}"))
        })?;

        let (schema, index_schema) = IndexSchema::build();
        let meta_exists = index_path.join("meta.json").exists();

        let index = if meta_exists {
            Index::open_in_dir(&index_path)?
        } else {
            let dir = MmapDirectory::open(&index_path)?;
            Index::create(dir, schema, IndexSettings::default())?
        };

        index
            .tokenizers()
            .register(crate::bm25::tokenizer::CODE_TOKENIZER_NAME, crate::bm25::tokenizer::CodeTokenizer);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        if meta_exists {
            reader.reload()?;
        }

        Ok(Self {
            index,
            reader,
            schema: index_schema,
            index_path,
            writer: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }

    /// Opens (lazily creating) the batch writer used by the `add_*` methods.
    pub fn start_batch(&self) -> StorageResult<()> {
        let mut guard = self.writer.lock().expect("storage writer mutex poisoned");
        if guard.is_none() {
            let writer = self.index.writer::<TantivyDocument>(100_000_000)?;
            *guard = Some(writer);
        }
        Ok(())
    }

    pub fn commit_batch(&self) -> StorageResult<()> {
        let mut guard = self.writer.lock().expect("storage writer mutex poisoned");
        if let Some(mut writer) = guard.take() {
            writer.commit()?;
            self.reader.reload()?;
        }
        Ok(())
    }

    fn with_writer<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut IndexWriter<TantivyDocument>) -> StorageResult<()>,
    {
        let mut guard = self.writer.lock().expect("storage writer mutex poisoned");
        let writer = guard
            .as_mut()
            .ok_or_else(|| StorageError::QueryParseError("no active batch; call start_batch() first".into()))?;
        f(writer)
    }

    pub fn add_repository(&self, repo: &Repository) -> StorageResult<()> {
        self.with_writer(|writer| {
            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::REPOSITORY);
            doc.add_u64(self.schema.repository_id, repo.id.value() as u64);
            doc.add_text(self.schema.repository_path, &repo.path);
            doc.add_text(self.schema.repository_name, &repo.name);
            writer.add_document(doc)?;
            Ok(())
        })
    }

    /// The repository row stored under `path`, if one has already been
    /// created.
    pub fn find_repository(&self, path: &str) -> StorageResult<Option<(RepositoryId, Repository)>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.doc_type, doc_type::REPOSITORY),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.repository_path, path),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_, addr)) = top.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(addr)?;
        let id = doc
            .get_first(self.schema.repository_id)
            .and_then(|v| v.as_u64())
            .and_then(|v| RepositoryId::new(v as u32))
            .ok_or_else(|| StorageError::SchemaMismatch {
                field: "repository_id".to_string(),
            })?;
        Ok(Some((
            id,
            Repository {
                id,
                path: field_str(&doc, self.schema.repository_path),
                name: field_str(&doc, self.schema.repository_name),
                metadata: HashMap::new(),
            },
        )))
    }

    /// Idempotent on `path`: returns the existing id if this path has
    /// already been registered, otherwise allocates the next repository id
    /// and inserts a new row. Manages its own batch when none is open, so
    /// callers don't need to bracket it with `start_batch`/`commit_batch`.
    pub fn create_repository(
        &self,
        path: &str,
        name: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<RepositoryId> {
        if let Some((id, _)) = self.find_repository(path)? {
            return Ok(id);
        }

        let next = self.get_metadata("repository_counter")?.unwrap_or(0) + 1;
        let id = RepositoryId::new(next as u32).ok_or_else(|| StorageError::SchemaMismatch {
            field: "repository_id".to_string(),
        })?;

        let owns_batch = self.writer.lock().expect("storage writer mutex poisoned").is_none();
        if owns_batch {
            self.start_batch()?;
        }
        self.add_repository(&Repository {
            id,
            path: path.to_string(),
            name: name.to_string(),
            metadata: metadata.clone(),
        })?;
        self.set_metadata("repository_counter", next)?;
        if owns_batch {
            self.commit_batch()?;
        }
        Ok(id)
    }

    pub fn add_file(&self, file: &File) -> StorageResult<()> {
        self.with_writer(|writer| {
            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::FILE);
            doc.add_u64(self.schema.file_id, file.id.value() as u64);
            doc.add_u64(self.schema.file_repository_id, file.repository_id.value() as u64);
            doc.add_text(self.schema.file_path, &file.path);
            doc.add_text(self.schema.file_relative_path, &file.relative_path);
            doc.add_text(self.schema.file_language, &file.language);
            doc.add_text(self.schema.file_hash, &file.hash);
            doc.add_u64(self.schema.file_mtime, file.mtime);
            doc.add_u64(self.schema.file_size, file.size);
            writer.add_document(doc)?;
            Ok(())
        })
    }

    pub fn add_symbol(&self, symbol: &Symbol, file_path: &str) -> StorageResult<()> {
        self.with_writer(|writer| {
            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::SYMBOL);
            doc.add_u64(self.schema.symbol_id, symbol.id.value() as u64);
            doc.add_u64(self.schema.file_id, symbol.file_id.value() as u64);
            doc.add_text(self.schema.file_path, file_path);
            doc.add_text(self.schema.name, &symbol.name);
            doc.add_text(self.schema.kind, symbol.kind.as_str());
            doc.add_u64(self.schema.line_number, symbol.start_line as u64);
            doc.add_u64(self.schema.end_line_number, symbol.end_line as u64);
            if let Some(sig) = &symbol.signature {
                doc.add_text(self.schema.signature, sig);
            }
            if let Some(doc_str) = &symbol.docstring {
                doc.add_text(self.schema.docstring, doc_str);
            }
            writer.add_document(doc)?;
            Ok(())
        })
    }

    pub fn add_reference(&self, file_id: FileId, file_path: &str, name: &str, line: u32) -> StorageResult<()> {
        self.with_writer(|writer| {
            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::REFERENCE);
            doc.add_u64(self.schema.file_id, file_id.value() as u64);
            doc.add_text(self.schema.file_path, file_path);
            doc.add_text(self.schema.ref_name, name);
            doc.add_u64(self.schema.ref_line, line as u64);
            writer.add_document(doc)?;
            Ok(())
        })
    }

    /// Every reference to `name`, across all indexed files.
    pub fn find_references(&self, name: &str) -> StorageResult<Vec<ReferenceHit>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.doc_type, doc_type::REFERENCE),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.ref_name, name),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(10_000))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (_, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            hits.push(ReferenceHit {
                file_path: field_str(&doc, self.schema.file_path),
                name: name.to_string(),
                line: doc.get_first(self.schema.ref_line).and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            });
        }
        hits.sort_by(|a, b| a.file_path.cmp(&b.file_path).then(a.line.cmp(&b.line)));
        Ok(hits)
    }

    /// Resolves the single "best" definition of `name`: symbols rank above
    /// variables/imports of the same name, matching the teacher's intuition
    /// that `find_symbol_definition` should prefer the declaration a caller
    /// actually meant. `language` narrows by `file_language` when given.
    pub fn find_symbol_definition(&self, name: &str, language: Option<&str>) -> StorageResult<Option<SymbolHit>> {
        let searcher = self.reader.searcher();
        let mut subqueries: Vec<Box<dyn Query>> = vec![
            (Box::new(TermQuery::new(
                Term::from_field_text(self.schema.doc_type, doc_type::SYMBOL),
                IndexRecordOption::Basic,
            )) as Box<dyn Query>),
            (Box::new(TermQuery::new(
                Term::from_field_text(self.schema.name, name),
                IndexRecordOption::Basic,
            )) as Box<dyn Query>),
        ];
        let query = BooleanQuery::new(subqueries.drain(..).map(|q| (Occur::Must, q)).collect());
        let top_docs = searcher.search(&query, &TopDocs::with_limit(50))?;

        let mut candidates = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let file_language = field_str(&doc, self.schema.file_language);
            if let Some(lang) = language {
                if !file_language.is_empty() && file_language != lang {
                    continue;
                }
            }
            let symbol_id = doc
                .get_first(self.schema.symbol_id)
                .and_then(|v| v.as_u64())
                .and_then(|id| SymbolId::new(id as u32));
            let Some(symbol_id) = symbol_id else { continue };
            candidates.push(SymbolHit {
                symbol_id,
                name: field_str(&doc, self.schema.name),
                kind: SymbolKind::new(field_str(&doc, self.schema.kind)),
                file_path: field_str(&doc, self.schema.file_path),
                line: doc.get_first(self.schema.line_number).and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                signature: doc.get_first(self.schema.signature).and_then(|v| v.as_str()).map(str::to_string),
                docstring: doc.get_first(self.schema.docstring).and_then(|v| v.as_str()).map(str::to_string),
                score,
            });
        }

        candidates.sort_by(|a, b| {
            b.kind.definition_rank().cmp(&a.kind.definition_rank())
                .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.file_path.cmp(&b.file_path))
        });
        Ok(candidates.into_iter().next())
    }

    /// Row counts across the six logical tables.
    pub fn get_statistics(&self) -> StorageResult<IndexStatistics> {
        let searcher = self.reader.searcher();
        let count_of = |dt: &str| -> StorageResult<u64> {
            let query = TermQuery::new(Term::from_field_text(self.schema.doc_type, dt), IndexRecordOption::Basic);
            Ok(searcher.search(&query, &tantivy::collector::Count)? as u64)
        };
        Ok(IndexStatistics {
            repository_count: count_of(doc_type::REPOSITORY)?,
            file_count: count_of(doc_type::FILE)?,
            symbol_count: count_of(doc_type::SYMBOL)?,
            reference_count: count_of(doc_type::REFERENCE)?,
            bm25_document_count: count_of(doc_type::BM25_DOCUMENT)?,
        })
    }

    /// Merges segments accumulated from incremental batches. Run periodically
    /// (e.g. after a large `index build`), not after every file.
    pub fn optimize_fts_tables(&self) -> StorageResult<()> {
        let writer = self.index.writer::<TantivyDocument>(50_000_000)?;
        writer.wait_merging_threads()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Plain substring scan over `bm25_document` bodies, used as the Query
    /// Optimizer's fallback plan when a query can't be served by the BM25
    /// index (e.g. punctuation-only queries the tokenizer would drop).
    pub fn search_content(&self, needle: &str, limit: usize) -> StorageResult<Vec<FullTextHit>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.schema.doc_type, doc_type::BM25_DOCUMENT),
            IndexRecordOption::Basic,
        );
        let needle_lower = needle.to_lowercase();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(10_000))?;
        let mut hits = Vec::new();
        for (_, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let content = field_str(&doc, self.schema.content);
            if content.to_lowercase().contains(&needle_lower) {
                hits.push(FullTextHit {
                    doc_key: field_str(&doc, self.schema.doc_key),
                    score: 1.0,
                });
                if hits.len() >= limit {
                    break;
                }
            }
        }
        Ok(hits)
    }

    pub fn add_bm25_document(&self, doc: &Bm25Document) -> StorageResult<()> {
        self.with_writer(|writer| {
            let mut tdoc = TantivyDocument::new();
            tdoc.add_text(self.schema.doc_type, doc_type::BM25_DOCUMENT);
            tdoc.add_text(self.schema.doc_key, &doc.doc_key);
            // doc_key is the file path for this engine's one-document-per-file
            // bm25 rows; stored under file_path too so remove_file_documents'
            // delete-by-file_path term also reaps stale bm25_document rows.
            tdoc.add_text(self.schema.file_path, &doc.doc_key);
            tdoc.add_text(self.schema.content, &doc.content);
            tdoc.add_text(self.schema.symbols_text, &doc.symbols);
            tdoc.add_text(self.schema.file_language, &doc.language);
            writer.add_document(tdoc)?;
            Ok(())
        })
    }

    pub fn set_metadata(&self, key: &str, value: u64) -> StorageResult<()> {
        self.with_writer(|writer| {
            let term = Term::from_field_text(self.schema.meta_key, key);
            writer.delete_term(term);
            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::METADATA);
            doc.add_text(self.schema.meta_key, key);
            doc.add_u64(self.schema.meta_value, value);
            writer.add_document(doc)?;
            Ok(())
        })
    }

    pub fn get_metadata(&self, key: &str) -> StorageResult<Option<u64>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.doc_type, doc_type::METADATA),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.meta_key, key),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);

        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        if let Some((_, addr)) = top.into_iter().next() {
            let doc: TantivyDocument = searcher.doc(addr)?;
            Ok(doc.get_first(self.schema.meta_value).and_then(|v| v.as_u64()))
        } else {
            Ok(None)
        }
    }

    /// Whether a `file` row for `file_path` is still present. Used by
    /// Hybrid Search to filter out BM25/fuzzy hits whose file has been
    /// removed from Storage but may not have been purged from the in-memory
    /// fuzzy index yet.
    pub fn file_exists(&self, file_path: &str) -> StorageResult<bool> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.doc_type, doc_type::FILE),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.file_path, file_path),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);
        let count = searcher.search(&query, &tantivy::collector::Count)?;
        Ok(count > 0)
    }

    /// Removes every document (symbol, reference, bm25_document, file)
    /// associated with one file path, e.g. before reindexing it.
    pub fn remove_file_documents(&self, file_path: &str) -> StorageResult<()> {
        let term = Term::from_field_text(self.schema.file_path, file_path);
        let mut guard = self.writer.lock().expect("storage writer mutex poisoned");
        if let Some(writer) = guard.as_mut() {
            writer.delete_term(term);
        } else {
            let mut writer = self.index.writer::<TantivyDocument>(50_000_000)?;
            writer.delete_term(term);
            writer.commit()?;
            drop(guard);
            self.reader.reload()?;
        }
        Ok(())
    }

    /// BM25-ranked symbol search over name/signature/docstring, with optional
    /// kind and language filters.
    pub fn search_symbols(
        &self,
        query_str: &str,
        limit: usize,
        kind_filter: Option<&SymbolKind>,
    ) -> StorageResult<Vec<SymbolHit>> {
        let searcher = self.reader.searcher();

        let mut subqueries: Vec<Box<dyn Query>> = vec![Box::new(TermQuery::new(
            Term::from_field_text(self.schema.doc_type, doc_type::SYMBOL),
            IndexRecordOption::Basic,
        ))];

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.schema.name, self.schema.signature, self.schema.docstring],
        );
        if let Ok(parsed) = query_parser.parse_query(query_str) {
            subqueries.push(parsed);
        }

        if let Some(kind) = kind_filter {
            subqueries.push(Box::new(TermQuery::new(
                Term::from_field_text(self.schema.kind, kind.as_str()),
                IndexRecordOption::Basic,
            )));
        }

        let query: Box<dyn Query> = Box::new(BooleanQuery::new(
            subqueries.into_iter().map(|q| (Occur::Must, q)).collect(),
        ));

        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let symbol_id = doc
                .get_first(self.schema.symbol_id)
                .and_then(|v| v.as_u64())
                .and_then(|id| SymbolId::new(id as u32))
                .ok_or_else(|| StorageError::SchemaMismatch {
                    field: "symbol_id".into(),
                })?;
            let name = field_str(&doc, self.schema.name);
            let kind = SymbolKind::new(field_str(&doc, self.schema.kind));
            let file_path = field_str(&doc, self.schema.file_path);
            let line = doc
                .get_first(self.schema.line_number)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            let signature = doc
                .get_first(self.schema.signature)
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let docstring = doc
                .get_first(self.schema.docstring)
                .and_then(|v| v.as_str())
                .map(str::to_string);

            hits.push(SymbolHit {
                symbol_id,
                name,
                kind,
                file_path,
                line,
                signature,
                docstring,
                score,
            });
        }
        Ok(hits)
    }

    /// BM25-ranked full-text search over `bm25_document` bodies.
    pub fn search_fulltext(&self, query_str: &str, limit: usize) -> StorageResult<Vec<FullTextHit>> {
        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.schema.content, self.schema.symbols_text],
        );
        let parsed = query_parser
            .parse_query(query_str)
            .map_err(|e| StorageError::QueryParseError(e.to_string()))?;

        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.doc_type, doc_type::BM25_DOCUMENT),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
            (Occur::Must, parsed),
        ]);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            hits.push(FullTextHit {
                doc_key: field_str(&doc, self.schema.doc_key),
                score,
            });
        }
        Ok(hits)
    }

    /// Document frequency for a term in `bm25_document` bodies, used by the
    /// BM25 facade's manual term-statistics computation.
    pub fn document_frequency(&self, term: &str) -> StorageResult<u64> {
        let searcher = self.reader.searcher();
        let t = Term::from_field_text(self.schema.content, term);
        let mut total = 0u64;
        for reader in searcher.segment_readers() {
            let inverted = reader.inverted_index(self.schema.content)?;
            if let Some(info) = inverted.get_term_info(&t)? {
                total += info.doc_freq as u64;
            }
        }
        Ok(total)
    }

    pub fn total_documents(&self) -> StorageResult<u64> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.schema.doc_type, doc_type::BM25_DOCUMENT),
            IndexRecordOption::Basic,
        );
        let count = searcher.search(&query, &tantivy::collector::Count)?;
        Ok(count as u64)
    }

    pub fn document_count(&self) -> StorageResult<u64> {
        Ok(self.reader.searcher().num_docs())
    }

    pub fn clear(&self) -> StorageResult<()> {
        let mut writer = self.index.writer::<TantivyDocument>(50_000_000)?;
        writer.delete_all_documents()?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }
}

fn field_str(doc: &TantivyDocument, field: tantivy::schema::Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
