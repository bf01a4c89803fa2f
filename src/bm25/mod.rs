//! BM25 full-text facade over the Storage Layer's `bm25_document` rows.
//!
//! Tantivy already scores with BM25 internally; this module's job is the
//! piece the engine still needs on top: term statistics for the Query
//! Optimizer's cost model, phrase/prefix/near convenience queries, and
//! `k1`/`b` defaults that match the spec (`1.2`/`0.75`) while staying
//! configurable.

pub mod tokenizer;

use crate::error::StorageResult;
use crate::model::Bm25Document;
use crate::storage::DocumentIndex;

/// Term statistics as exposed to callers, matching spec §4.C's
/// `get_term_statistics` shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStatistics {
    pub document_frequency: u64,
    pub total_documents: u64,
    pub idf: f64,
    pub percentage: f64,
}

/// One ranked BM25 hit.
#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub doc_key: String,
    pub score: f32,
}

pub struct Bm25Index<'a> {
    storage: &'a DocumentIndex,
    k1: f32,
    b: f32,
}

impl<'a> Bm25Index<'a> {
    pub fn new(storage: &'a DocumentIndex, k1: f32, b: f32) -> Self {
        Self { storage, k1, b }
    }

    pub fn k1(&self) -> f32 {
        self.k1
    }

    pub fn b(&self) -> f32 {
        self.b
    }

    /// Indexes one document. The caller must have opened a batch on the
    /// underlying storage (`storage.start_batch()`).
    pub fn add_document(&self, doc: &Bm25Document) -> StorageResult<()> {
        self.storage.add_bm25_document(doc)
    }

    /// Removes a document before re-indexing it, so corpus statistics stay
    /// accurate (stale term counts would otherwise skew IDF).
    pub fn remove_document(&self, doc_key: &str) -> StorageResult<()> {
        self.storage.remove_file_documents(doc_key)
    }

    pub fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        Ok(self
            .storage
            .search_fulltext(query, limit)?
            .into_iter()
            .map(|hit| Bm25Hit {
                doc_key: hit.doc_key,
                score: hit.score,
            })
            .collect())
    }

    pub fn search_prefix(&self, term_prefix: &str, limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        self.search(&format!("{term_prefix}*"), limit)
    }

    /// Phrase search: terms must appear contiguously and in order.
    pub fn search_phrase(&self, phrase: &[&str], limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        if phrase.is_empty() {
            return Ok(Vec::new());
        }
        self.search(&format!("\"{}\"", phrase.join(" ")), limit)
    }

    /// NEAR search: all `terms` must appear within `distance` tokens of each
    /// other, in any order.
    pub fn search_near(&self, terms: &[&str], distance: u32, limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        self.search(&format!("\"{}\"~{distance}", terms.join(" ")), limit)
    }

    /// `{document_frequency, total_documents, idf, percentage}` for one
    /// term, computed from Tantivy's segment-level term info — the
    /// statistics the Query Optimizer's cost model consumes directly.
    pub fn term_statistics(&self, term: &str) -> StorageResult<TermStatistics> {
        let normalized = term.to_lowercase();
        let document_frequency = self.storage.document_frequency(&normalized)?;
        let total_documents = self.storage.total_documents()?.max(1);

        let idf = ((total_documents as f64 - document_frequency as f64 + 0.5)
            / (document_frequency as f64 + 0.5)
            + 1.0)
            .ln();
        let percentage = 100.0 * document_frequency as f64 / total_documents as f64;

        Ok(TermStatistics {
            document_frequency,
            total_documents,
            idf,
            percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentIndex;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn sample_doc(key: &str, content: &str) -> Bm25Document {
        Bm25Document {
            doc_key: key.to_string(),
            content: content.to_string(),
            symbols: String::new(),
            language: "rust".to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn search_finds_indexed_document() {
        let dir = TempDir::new().unwrap();
        let storage = DocumentIndex::open(dir.path()).unwrap();
        let bm25 = Bm25Index::new(&storage, 1.2, 0.75);

        storage.start_batch().unwrap();
        bm25.add_document(&sample_doc("src/lib.rs", "fn parse_json(input: &str)"))
            .unwrap();
        storage.commit_batch().unwrap();

        let hits = bm25.search("json", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_key, "src/lib.rs");
    }

    #[test]
    fn term_statistics_reflect_corpus_size() {
        let dir = TempDir::new().unwrap();
        let storage = DocumentIndex::open(dir.path()).unwrap();
        let bm25 = Bm25Index::new(&storage, 1.2, 0.75);

        storage.start_batch().unwrap();
        bm25.add_document(&sample_doc("a.rs", "fn alpha()")).unwrap();
        bm25.add_document(&sample_doc("b.rs", "fn beta()")).unwrap();
        storage.commit_batch().unwrap();

        let stats = bm25.term_statistics("alpha").unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.document_frequency, 1);
        assert!(stats.idf > 0.0);
    }

    #[test]
    fn defaults_match_spec_constants() {
        let dir = TempDir::new().unwrap();
        let storage = DocumentIndex::open(dir.path()).unwrap();
        let bm25 = Bm25Index::new(&storage, 1.2, 0.75);
        assert_eq!(bm25.k1(), 1.2);
        assert_eq!(bm25.b(), 0.75);
    }
}
