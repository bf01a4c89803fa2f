//! Reranker Interface: a second-stage scorer that reorders the candidates
//! Hybrid Search already fused. New relative to the teacher; grounded in the
//! BM25 tokenizer built for the Storage Layer (4.C) for the local TF-IDF
//! backend, and in the teacher's optional-feature pattern (its `http-server`/
//! `https-server` features) for gating the network-backed reranker.

pub mod tfidf;

#[cfg(feature = "reranker-remote")]
pub mod remote;

use crate::error::IndexResult;
use crate::hybrid::HybridHit;

/// One reranked result: the original fused hit, its old and new rank, and
/// the reranker's own score for it.
#[derive(Debug, Clone)]
pub struct RerankedHit {
    pub original_result: HybridHit,
    pub original_rank: usize,
    pub new_rank: usize,
    pub rerank_score: f64,
}

/// What a reranker backend reports about itself, surfaced by `codex-index
/// config show` and used by the CLI to warn before a network-backed rerank.
#[derive(Debug, Clone)]
pub struct RerankerCapabilities {
    pub name: &'static str,
    pub local: bool,
    pub needs_network: bool,
    pub batch_size: usize,
}

/// Second-stage scorer over Hybrid Search's fused candidates.
///
/// Any failure here must degrade to the un-reranked fused ordering — the
/// outer search call never fails because reranking failed. Implementations
/// honor this by returning `Err` only for truly unrecoverable setup issues;
/// per-candidate scoring failures should just drop that candidate's rerank
/// contribution rather than abort the whole call.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, candidates: &[HybridHit], top_k: usize) -> IndexResult<Vec<RerankedHit>>;

    fn capabilities(&self) -> RerankerCapabilities;
}

/// Reranks with `primary`; on any error, falls back to `fallback`. When both
/// succeed, scores blend as `w_p * primary + w_f * fallback` per candidate
/// key (file_path:line), matching spec.md §4.H's hybrid-reranker formula.
pub struct HybridReranker {
    primary: Box<dyn Reranker>,
    fallback: Box<dyn Reranker>,
    primary_weight: f64,
    fallback_weight: f64,
}

impl HybridReranker {
    pub fn new(primary: Box<dyn Reranker>, fallback: Box<dyn Reranker>, primary_weight: f64, fallback_weight: f64) -> Self {
        Self {
            primary,
            fallback,
            primary_weight,
            fallback_weight,
        }
    }

    fn candidate_key(hit: &HybridHit) -> String {
        format!("{}:{}", hit.file_path, hit.line.unwrap_or(0))
    }
}

impl Reranker for HybridReranker {
    fn rerank(&self, query: &str, candidates: &[HybridHit], top_k: usize) -> IndexResult<Vec<RerankedHit>> {
        let primary = self.primary.rerank(query, candidates, candidates.len());
        let Ok(primary) = primary else {
            return self.fallback.rerank(query, candidates, top_k);
        };

        let fallback = self.fallback.rerank(query, candidates, candidates.len()).ok();

        let mut scores: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
        for hit in &primary {
            let key = Self::candidate_key(&hit.original_result);
            *scores.entry(key).or_insert(0.0) += self.primary_weight * hit.rerank_score;
        }
        if let Some(fallback) = &fallback {
            for hit in fallback {
                let key = Self::candidate_key(&hit.original_result);
                *scores.entry(key).or_insert(0.0) += self.fallback_weight * hit.rerank_score;
            }
        }

        let mut ranked: Vec<(usize, &HybridHit)> = candidates.iter().enumerate().collect();
        ranked.sort_by(|(_, a), (_, b)| {
            let sa = scores.get(&Self::candidate_key(a)).copied().unwrap_or(0.0);
            let sb = scores.get(&Self::candidate_key(b)).copied().unwrap_or(0.0);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ranked
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(new_rank, (original_rank, hit))| RerankedHit {
                original_result: hit.clone(),
                original_rank,
                new_rank,
                rerank_score: scores.get(&Self::candidate_key(hit)).copied().unwrap_or(0.0),
            })
            .collect())
    }

    fn capabilities(&self) -> RerankerCapabilities {
        let p = self.primary.capabilities();
        let f = self.fallback.capabilities();
        RerankerCapabilities {
            name: "hybrid",
            local: p.local && f.local,
            needs_network: p.needs_network || f.needs_network,
            batch_size: p.batch_size.min(f.batch_size),
        }
    }
}

/// Builds the configured reranker backend, falling back to a no-op identity
/// reranker for `"none"`. Construction never fails for local backends; the
/// remote backends defer connectivity checks to the first `rerank` call so
/// startup never depends on network reachability.
pub fn build(config: &crate::config::RerankerConfig) -> Box<dyn Reranker> {
    match config.backend.as_str() {
        "tfidf" => Box::new(tfidf::TfIdfReranker::new()),
        #[cfg(feature = "reranker-remote")]
        "cross-encoder" => Box::new(remote::CrossEncoderReranker::new(config.clone())),
        #[cfg(feature = "reranker-remote")]
        "external" => Box::new(remote::ExternalApiReranker::new(config.clone())),
        #[cfg(feature = "reranker-remote")]
        "hybrid" => Box::new(HybridReranker::new(
            Box::new(tfidf::TfIdfReranker::new()),
            Box::new(remote::ExternalApiReranker::new(config.clone())),
            0.6,
            0.4,
        )),
        _ => Box::new(NoopReranker),
    }
}

/// Identity reranker for `backend = "none"`: preserves the fused ordering.
struct NoopReranker;

impl Reranker for NoopReranker {
    fn rerank(&self, _query: &str, candidates: &[HybridHit], top_k: usize) -> IndexResult<Vec<RerankedHit>> {
        Ok(candidates
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(i, hit)| RerankedHit {
                original_result: hit.clone(),
                original_rank: i,
                new_rank: i,
                rerank_score: hit.score,
            })
            .collect())
    }

    fn capabilities(&self) -> RerankerCapabilities {
        RerankerCapabilities {
            name: "none",
            local: true,
            needs_network: false,
            batch_size: usize::MAX,
        }
    }
}
