//! Local TF-IDF reranker: cosine similarity between the query and each
//! candidate's snippet, using simple term-frequency vectors. No external
//! dependency, no network — the always-available reranker backend.

use std::collections::HashMap;

use crate::error::IndexResult;
use crate::hybrid::HybridHit;
use crate::reranker::{RerankedHit, RerankerCapabilities, Reranker};

pub struct TfIdfReranker;

impl Default for TfIdfReranker {
    fn default() -> Self {
        Self::new()
    }
}

impl TfIdfReranker {
    pub fn new() -> Self {
        Self
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn term_vector(tokens: &[String]) -> HashMap<&str, f64> {
        let mut counts: HashMap<&str, f64> = HashMap::new();
        for t in tokens {
            *counts.entry(t.as_str()).or_insert(0.0) += 1.0;
        }
        counts
    }

    fn cosine_similarity(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>) -> f64 {
        let mut dot = 0.0;
        for (term, weight) in a {
            if let Some(other) = b.get(term) {
                dot += weight * other;
            }
        }
        let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
        let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm_a <= 0.0 || norm_b <= 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

impl Reranker for TfIdfReranker {
    fn rerank(&self, query: &str, candidates: &[HybridHit], top_k: usize) -> IndexResult<Vec<RerankedHit>> {
        let query_tokens = Self::tokenize(query);
        let query_vector = Self::term_vector(&query_tokens);

        let mut scored: Vec<(usize, &HybridHit, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let text = format!("{} {}", hit.snippet, hit.file_path);
                let doc_tokens = Self::tokenize(&text);
                let doc_vector = Self::term_vector(&doc_tokens);
                let score = Self::cosine_similarity(&query_vector, &doc_vector);
                (i, hit, score)
            })
            .collect();

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(new_rank, (original_rank, hit, score))| RerankedHit {
                original_result: hit.clone(),
                original_rank,
                new_rank,
                rerank_score: score,
            })
            .collect())
    }

    fn capabilities(&self) -> RerankerCapabilities {
        RerankerCapabilities {
            name: "tfidf",
            local: true,
            needs_network: false,
            batch_size: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn hit(path: &str, snippet: &str) -> HybridHit {
        HybridHit {
            file_path: path.to_string(),
            line: Some(1),
            score: 0.5,
            snippet: snippet.to_string(),
            source: crate::hybrid::Source::Bm25,
            contributions: Map::new(),
        }
    }

    #[test]
    fn ranks_lexically_closer_snippet_first() {
        let reranker = TfIdfReranker::new();
        let candidates = vec![
            hit("a.rs", "fn unrelated_thing() {}"),
            hit("b.rs", "fn parse_json(input: &str) -> Value"),
        ];
        let ranked = reranker.rerank("parse json value", &candidates, 10).unwrap();
        assert_eq!(ranked[0].original_result.file_path, "b.rs");
    }

    #[test]
    fn empty_query_yields_zero_scores_without_panicking() {
        let reranker = TfIdfReranker::new();
        let candidates = vec![hit("a.rs", "fn foo() {}")];
        let ranked = reranker.rerank("", &candidates, 10).unwrap();
        assert_eq!(ranked[0].rerank_score, 0.0);
    }
}
