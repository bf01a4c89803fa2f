//! Hybrid Search: fans out to BM25, Fuzzy, and (optionally) a semantic
//! source concurrently, fuses the ranked lists with Reciprocal-Rank Fusion,
//! and caches results keyed by the normalized query and search parameters.
//!
//! Grounded in the teacher's fan-out/fusion shape, adapted from vector-store
//! hybrid ranking to this engine's BM25/Fuzzy/semantic source set.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::bm25::Bm25Index;
use crate::config::HybridConfig;
use crate::error::IndexResult;
use crate::fuzzy::FuzzyIndex;
use crate::reranker::Reranker;
use crate::storage::DocumentIndex;

/// One hit from a dense-vector similarity search, ranked by the provider's
/// own distance metric (caller-defined, not reinterpreted here).
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub file_path: String,
    pub line: Option<u32>,
    pub snippet: String,
    pub score: f64,
}

/// Contract for the optional dense-embedding collaborator named in spec
/// §1's out-of-scope list: an external vector store that Hybrid Search can
/// fan out to alongside BM25 and Fuzzy, without this crate knowing anything
/// about embedding models, dimensions, or similarity metrics. No
/// implementation ships in this crate; `HybridSearch::with_semantic_provider`
/// is the seam a host application plugs one into.
pub trait SemanticProvider: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> IndexResult<Vec<SemanticHit>>;
}

/// Where one hybrid result's score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Bm25,
    Semantic,
    Fuzzy,
    Hybrid,
}

impl Source {
    /// Tie-break priority when scores are equal: bm25 > semantic > fuzzy.
    fn priority(self) -> u8 {
        match self {
            Self::Bm25 => 0,
            Self::Semantic => 1,
            Self::Fuzzy => 2,
            Self::Hybrid => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridHit {
    pub file_path: String,
    pub line: Option<u32>,
    pub score: f64,
    pub snippet: String,
    pub source: Source,
    /// Per-source `(rank, score)` contributions, populated for hits that
    /// appeared in more than one source.
    pub contributions: HashMap<&'static str, (usize, f64)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceWeights {
    pub bm25: f64,
    pub semantic: f64,
    pub fuzzy: f64,
}

impl SourceWeights {
    /// Renormalizes so the three weights sum to 1, matching spec §4.G's
    /// "weights summing to 1 (renormalized otherwise)" requirement. Returns
    /// `None` when all weights are zero — there is no ranking to renormalize
    /// towards, so the caller gets an empty result instead of an arbitrary one.
    fn normalized(self) -> Option<Self> {
        let total = self.bm25 + self.semantic + self.fuzzy;
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            bm25: self.bm25 / total,
            semantic: self.semantic / total,
            fuzzy: self.fuzzy / total,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnabledSources {
    pub bm25: bool,
    pub semantic: bool,
    pub fuzzy: bool,
}

impl Default for EnabledSources {
    fn default() -> Self {
        Self {
            bm25: true,
            semantic: false,
            fuzzy: true,
        }
    }
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct CacheKey {
    query: String,
    limit: usize,
    sources: (bool, bool, bool),
    weights: (u64, u64, u64),
}

fn quantize(w: f64) -> u64 {
    (w * 1_000.0).round() as u64
}

/// One candidate collected from a single source's ranked list before fusion.
struct RankedCandidate {
    key: String,
    file_path: String,
    line: Option<u32>,
    snippet: String,
    rank: usize,
    score: f64,
}

pub struct HybridSearch {
    storage: Arc<DocumentIndex>,
    fuzzy: Arc<Mutex<FuzzyIndex>>,
    config: HybridConfig,
    cache: Mutex<LruCache<CacheKey, Vec<HybridHit>>>,
    reranker: Option<Arc<dyn Reranker>>,
    semantic: Option<Arc<dyn SemanticProvider>>,
}

impl HybridSearch {
    pub fn new(storage: Arc<DocumentIndex>, fuzzy: Arc<Mutex<FuzzyIndex>>, config: HybridConfig) -> Self {
        let cache_size = NonZeroUsize::new(config.cache_size.max(1)).unwrap();
        Self {
            storage,
            fuzzy,
            config,
            cache: Mutex::new(LruCache::new(cache_size)),
            reranker: None,
            semantic: None,
        }
    }

    /// Plugs in a second-stage reranker; applied to the top `rerank_top_k`
    /// fused hits on every subsequent `search` call.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self.invalidate_cache();
        self
    }

    /// Plugs in a dense-vector collaborator; `EnabledSources::semantic`
    /// has no effect until one is attached. Without a provider, semantic
    /// queries contribute nothing to the fused score even if requested.
    pub fn with_semantic_provider(mut self, provider: Arc<dyn SemanticProvider>) -> Self {
        self.semantic = Some(provider);
        self.invalidate_cache();
        self
    }

    /// Clears the result cache; called whenever weights or enabled sources
    /// are mutated, since cached rankings would otherwise reflect stale
    /// configuration.
    pub fn invalidate_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn search(
        &self,
        query: &str,
        limit: usize,
        enabled: EnabledSources,
        weights: SourceWeights,
    ) -> Vec<HybridHit> {
        let normalized_query = query.trim().to_lowercase();
        let Some(weights) = weights.normalized() else {
            return Vec::new();
        };
        let cache_key = CacheKey {
            query: normalized_query.clone(),
            limit,
            sources: (enabled.bm25, enabled.semantic, enabled.fuzzy),
            weights: (quantize(weights.bm25), quantize(weights.semantic), quantize(weights.fuzzy)),
        };

        if let Some(hits) = self.cache.lock().get(&cache_key) {
            return hits.clone();
        }

        let individual_limit = ((limit as f64) * 2.5).max(50.0) as usize;

        let bm25_index = Bm25Index::new(&self.storage, 1.2, 0.75);
        let ((bm25_results, fuzzy_results), semantic_results) = rayon::join(
            || {
                rayon::join(
                    || {
                        if enabled.bm25 {
                            bm25_index.search(query, individual_limit).unwrap_or_default()
                        } else {
                            Vec::new()
                        }
                    },
                    || {
                        if enabled.fuzzy {
                            self.fuzzy.lock().search_names(query, individual_limit)
                        } else {
                            Vec::new()
                        }
                    },
                )
            },
            || {
                if enabled.semantic {
                    self.semantic
                        .as_ref()
                        .and_then(|provider| provider.search(query, individual_limit).ok())
                        .unwrap_or_default()
                } else {
                    Vec::new()
                }
            },
        );

        let bm25_candidates: Vec<RankedCandidate> = bm25_results
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RankedCandidate {
                key: hit.doc_key.clone(),
                file_path: hit.doc_key,
                line: None,
                snippet: String::new(),
                rank: i + 1,
                score: hit.score as f64,
            })
            .collect();

        let fuzzy_candidates: Vec<RankedCandidate> = fuzzy_results
            .into_iter()
            .enumerate()
            .map(|(i, entry)| RankedCandidate {
                key: format!("{}:{}", entry.file, entry.line),
                file_path: entry.file,
                line: Some(entry.line),
                snippet: entry.name,
                rank: i + 1,
                score: 1.0 / (i + 1) as f64,
            })
            .collect();

        let semantic_candidates: Vec<RankedCandidate> = semantic_results
            .into_iter()
            .enumerate()
            .map(|(i, hit): (usize, SemanticHit)| RankedCandidate {
                key: format!("{}:{}", hit.file_path, hit.line.unwrap_or(0)),
                file_path: hit.file_path,
                line: hit.line,
                snippet: hit.snippet,
                rank: i + 1,
                score: hit.score,
            })
            .collect();

        let fused = self.fuse(
            &[
                ("bm25", weights.bm25, &bm25_candidates),
                ("fuzzy", weights.fuzzy, &fuzzy_candidates),
                ("semantic", weights.semantic, &semantic_candidates),
            ],
            limit,
        );

        let fused = self.filter_missing_files(fused);
        let fused = self.apply_reranker(query, fused);

        self.cache.lock().put(cache_key, fused.clone());
        fused
    }

    /// Drops hits whose file row no longer exists in Storage, per spec's
    /// open-question resolution: a fuzzy/BM25 hit can outlive the File row
    /// it came from until the stale source is cleaned up, and Hybrid Search
    /// must not surface it in the meantime.
    fn filter_missing_files(&self, hits: Vec<HybridHit>) -> Vec<HybridHit> {
        hits.into_iter()
            .filter(|hit| self.storage.file_exists(&hit.file_path).unwrap_or(true))
            .collect()
    }

    /// Reranks the top `rerank_top_k` hits in place, leaving the remainder in
    /// fused order. Any reranker failure is swallowed: the fused ordering
    /// ships unchanged rather than failing the search.
    fn apply_reranker(&self, query: &str, hits: Vec<HybridHit>) -> Vec<HybridHit> {
        let Some(reranker) = &self.reranker else {
            return hits;
        };
        let split = self.config.rerank_top_k.min(hits.len());
        let (head, tail) = hits.split_at(split);
        let tail = tail.to_vec();

        match reranker.rerank(query, head, split) {
            Ok(reranked) if !reranked.is_empty() => {
                let mut result: Vec<HybridHit> = reranked.into_iter().map(|r| r.original_result).collect();
                result.extend(tail);
                result
            }
            _ => {
                let mut result = head.to_vec();
                result.extend(tail);
                result
            }
        }
    }

    /// Reciprocal-Rank Fusion: `score(d) = Σ_S w_S / (k + r_S(d))`, k = 60.
    fn fuse(&self, sources: &[(&'static str, f64, &[RankedCandidate])], limit: usize) -> Vec<HybridHit> {
        let k = self.config.rrf_k as f64;
        let mut merged: HashMap<String, HybridHit> = HashMap::new();

        for (name, weight, candidates) in sources {
            if *weight <= 0.0 {
                continue;
            }
            for candidate in *candidates {
                let source = match *name {
                    "bm25" => Source::Bm25,
                    "fuzzy" => Source::Fuzzy,
                    _ => Source::Semantic,
                };
                let contribution = weight / (k + candidate.rank as f64);
                let entry = merged.entry(candidate.key.clone()).or_insert_with(|| HybridHit {
                    file_path: candidate.file_path.clone(),
                    line: candidate.line,
                    score: 0.0,
                    snippet: candidate.snippet.clone(),
                    source,
                    contributions: HashMap::new(),
                });
                entry.score += contribution;
                entry
                    .contributions
                    .insert(*name, (candidate.rank, candidate.score));
                if entry.contributions.len() > 1 {
                    entry.source = Source::Hybrid;
                } else {
                    entry.source = source;
                }
            }
        }

        let mut results: Vec<HybridHit> = merged.into_values().collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.priority().cmp(&b.source.priority()))
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
        });
        results.truncate(limit);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bm25Document, File, FuzzyEntry};
    use crate::types::{FileId, RepositoryId};
    use tempfile::TempDir;

    fn sample_storage(dir: &TempDir) -> Arc<DocumentIndex> {
        let storage = DocumentIndex::open(dir.path()).unwrap();
        storage.start_batch().unwrap();
        storage
            .add_file(&File {
                id: FileId::new(1).unwrap(),
                repository_id: RepositoryId::new(1).unwrap(),
                path: "src/lib.rs".to_string(),
                relative_path: "lib.rs".to_string(),
                language: "rust".to_string(),
                size: 0,
                hash: "deadbeef".to_string(),
                mtime: 0,
                content: None,
            })
            .unwrap();
        storage
            .add_bm25_document(&Bm25Document {
                doc_key: "src/lib.rs".to_string(),
                content: "fn parse_json(input: &str) -> Value".to_string(),
                symbols: "parse_json".to_string(),
                language: "rust".to_string(),
                metadata: HashMap::new(),
            })
            .unwrap();
        storage.commit_batch().unwrap();
        Arc::new(storage)
    }

    #[test]
    fn fuses_bm25_and_fuzzy_with_bm25_priority_on_tie() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let mut fuzzy_index = FuzzyIndex::new();
        fuzzy_index.insert(FuzzyEntry {
            name: "parse_json".to_string(),
            file: "src/lib.rs".to_string(),
            line: 1,
            metadata: None,
        });
        let fuzzy = Arc::new(Mutex::new(fuzzy_index));

        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default());
        let hits = search.search(
            "parse_json",
            10,
            EnabledSources::default(),
            SourceWeights {
                bm25: 1.0,
                semantic: 0.0,
                fuzzy: 0.5,
            },
        );
        assert!(!hits.is_empty());
        assert_eq!(hits[0].source, Source::Hybrid);
    }

    #[test]
    fn cache_hits_return_identical_results_without_recomputing() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default());

        let weights = SourceWeights {
            bm25: 1.0,
            semantic: 0.0,
            fuzzy: 0.0,
        };
        let first = search.search("parse", 10, EnabledSources::default(), weights);
        let second = search.search("parse", 10, EnabledSources::default(), weights);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn invalidate_cache_clears_entries() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default());
        let weights = SourceWeights {
            bm25: 1.0,
            semantic: 0.0,
            fuzzy: 0.0,
        };
        search.search("parse", 10, EnabledSources::default(), weights);
        assert_eq!(search.cache.lock().len(), 1);
        search.invalidate_cache();
        assert_eq!(search.cache.lock().len(), 0);
    }

    #[test]
    fn all_zero_weights_return_no_results() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default());
        let hits = search.search(
            "parse",
            10,
            EnabledSources::default(),
            SourceWeights {
                bm25: 0.0,
                semantic: 0.0,
                fuzzy: 0.0,
            },
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn missing_files_are_dropped_once_removed_from_storage() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let search = HybridSearch::new(storage.clone(), fuzzy, HybridConfig::default());

        let weights = SourceWeights {
            bm25: 1.0,
            semantic: 0.0,
            fuzzy: 0.0,
        };
        let hits = search.search("parse", 10, EnabledSources::default(), weights);
        assert!(!hits.is_empty());

        storage.remove_file_documents("src/lib.rs").unwrap();
        search.invalidate_cache();
        let hits = search.search("parse", 10, EnabledSources::default(), weights);
        assert!(hits.is_empty());
    }

    #[test]
    fn reranker_reorders_the_top_slice() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let reranker: Arc<dyn crate::reranker::Reranker> = Arc::new(crate::reranker::tfidf::TfIdfReranker::new());
        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default()).with_reranker(reranker);

        let weights = SourceWeights {
            bm25: 1.0,
            semantic: 0.0,
            fuzzy: 0.0,
        };
        let hits = search.search("parse", 10, EnabledSources::default(), weights);
        assert!(!hits.is_empty());
    }

    struct FakeSemanticProvider;

    impl SemanticProvider for FakeSemanticProvider {
        fn search(&self, _query: &str, _limit: usize) -> IndexResult<Vec<SemanticHit>> {
            Ok(vec![SemanticHit {
                file_path: "src/lib.rs".to_string(),
                line: None,
                snippet: "fn parse_json(input: &str) -> Value".to_string(),
                score: 0.9,
            }])
        }
    }

    #[test]
    fn semantic_provider_contributes_when_plugged_in_and_enabled() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default())
            .with_semantic_provider(Arc::new(FakeSemanticProvider));

        let enabled = EnabledSources {
            bm25: false,
            semantic: true,
            fuzzy: false,
        };
        let weights = SourceWeights {
            bm25: 0.0,
            semantic: 1.0,
            fuzzy: 0.0,
        };
        let hits = search.search("parse_json", 10, enabled, weights);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, Source::Semantic);
    }

    #[test]
    fn semantic_enabled_without_provider_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = sample_storage(&dir);
        let fuzzy = Arc::new(Mutex::new(FuzzyIndex::new()));
        let search = HybridSearch::new(storage, fuzzy, HybridConfig::default());

        let enabled = EnabledSources {
            bm25: false,
            semantic: true,
            fuzzy: false,
        };
        let weights = SourceWeights {
            bm25: 0.0,
            semantic: 1.0,
            fuzzy: 0.0,
        };
        let hits = search.search("parse_json", 10, enabled, weights);
        assert!(hits.is_empty());
    }
}
