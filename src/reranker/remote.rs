//! Network-backed reranker backends, gated behind the `reranker-remote`
//! feature the same way the teacher gates its optional HTTP server features.
//! Both backends batch candidates into one request and degrade to
//! `IndexError::RerankerUnavailable` on any transport/auth failure — callers
//! are expected to wrap these in a [`crate::reranker::HybridReranker`] so a
//! network hiccup never blocks the un-reranked fused ordering from shipping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::{IndexError, IndexResult};
use crate::hybrid::HybridHit;
use crate::reranker::{RerankedHit, RerankerCapabilities, Reranker};

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: Vec<&'a str>,
    top_k: usize,
}

#[derive(Deserialize)]
struct RerankResponseEntry {
    index: usize,
    relevance_score: f64,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseEntry>,
}

fn call_endpoint(
    client: &reqwest::blocking::Client,
    endpoint: &str,
    api_key: Option<&str>,
    query: &str,
    candidates: &[HybridHit],
    top_k: usize,
) -> IndexResult<Vec<RerankResponseEntry>> {
    let documents: Vec<&str> = candidates.iter().map(|h| h.snippet.as_str()).collect();
    let mut request = client.post(endpoint).json(&RerankRequest {
        query,
        documents,
        top_k,
    });
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().map_err(|e| IndexError::RerankerUnavailable {
        name: endpoint.to_string(),
        reason: format!("network error: {e}"),
    })?;

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(IndexError::RerankerUnavailable {
            name: endpoint.to_string(),
            reason: "rate limited".to_string(),
        });
    }
    if response.status() == reqwest::StatusCode::UNAUTHORIZED || response.status() == reqwest::StatusCode::FORBIDDEN {
        return Err(IndexError::RerankerUnavailable {
            name: endpoint.to_string(),
            reason: "authentication rejected".to_string(),
        });
    }
    if !response.status().is_success() {
        return Err(IndexError::RerankerUnavailable {
            name: endpoint.to_string(),
            reason: format!("unexpected status {}", response.status()),
        });
    }

    let parsed: RerankResponse = response.json().map_err(|e| IndexError::RerankerUnavailable {
        name: endpoint.to_string(),
        reason: format!("invalid response body: {e}"),
    })?;
    Ok(parsed.results)
}

fn to_reranked(candidates: &[HybridHit], entries: Vec<RerankResponseEntry>) -> Vec<RerankedHit> {
    let mut entries = entries;
    entries.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(new_rank, entry)| {
            candidates.get(entry.index).map(|hit| RerankedHit {
                original_result: hit.clone(),
                original_rank: entry.index,
                new_rank,
                rerank_score: entry.relevance_score,
            })
        })
        .collect()
}

/// Calls a locally-hosted cross-encoder inference server (the teacher's
/// pattern for its own local MCP server: a fixed endpoint, no API key).
pub struct CrossEncoderReranker {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl CrossEncoderReranker {
    pub fn new(config: RerankerConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            client,
            endpoint: config.endpoint.unwrap_or_else(|| "http://127.0.0.1:8088/rerank".to_string()),
        }
    }
}

impl Reranker for CrossEncoderReranker {
    fn rerank(&self, query: &str, candidates: &[HybridHit], top_k: usize) -> IndexResult<Vec<RerankedHit>> {
        let entries = call_endpoint(&self.client, &self.endpoint, None, query, candidates, top_k)?;
        Ok(to_reranked(candidates, entries))
    }

    fn capabilities(&self) -> RerankerCapabilities {
        RerankerCapabilities {
            name: "cross-encoder",
            local: true,
            needs_network: true,
            batch_size: 64,
        }
    }
}

/// Remote rerank endpoint (Cohere-like): bearer auth via an `*_API_KEY`
/// environment variable, per spec.md §6's environment variable table.
pub struct ExternalApiReranker {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ExternalApiReranker {
    pub fn new(config: RerankerConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            client,
            endpoint: config.endpoint.unwrap_or_else(|| "https://api.rerank.example/v1/rerank".to_string()),
            api_key: std::env::var("RERANKER_API_KEY").ok(),
        }
    }
}

impl Reranker for ExternalApiReranker {
    fn rerank(&self, query: &str, candidates: &[HybridHit], top_k: usize) -> IndexResult<Vec<RerankedHit>> {
        let entries = call_endpoint(
            &self.client,
            &self.endpoint,
            self.api_key.as_deref(),
            query,
            candidates,
            top_k,
        )?;
        Ok(to_reranked(candidates, entries))
    }

    fn capabilities(&self) -> RerankerCapabilities {
        RerankerCapabilities {
            name: "external",
            local: false,
            needs_network: true,
            batch_size: 96,
        }
    }
}
