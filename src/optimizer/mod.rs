//! Query Optimizer: picks an index/strategy per query, estimates cost, and
//! tracks statistics that later feed index suggestions.
//!
//! Grounded in `query_optimizer.py`'s cost model — a Rust-native recreation
//! of its rewrite/select-index/order-filters/cache/cost pipeline, with the
//! `md5`-keyed cache key it specifies for the plan cache.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use md5::{Digest, Md5};
use parking_lot::Mutex;

use crate::config::OptimizerConfig;

/// The six query shapes the rest of the engine can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Symbol,
    Text,
    Fuzzy,
    Semantic,
    Reference,
    Definition,
}

impl QueryType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::Text => "text",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
            Self::Reference => "reference",
            Self::Definition => "definition",
        }
    }

    /// Queries that have no conventional index and therefore degrade the
    /// optimizer's confidence in its own cost estimate.
    fn is_exotic(self) -> bool {
        matches!(self, Self::Semantic | Self::Reference | Self::Definition)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    pub query_type: QueryType,
    pub text: String,
    pub filters: HashMap<String, String>,
    pub limit: usize,
    pub offset: usize,
    pub metadata: HashMap<String, String>,
}

impl Query {
    pub fn new(query_type: QueryType, text: impl Into<String>) -> Self {
        Self {
            query_type,
            text: text.into(),
            filters: HashMap::new(),
            limit: 20,
            offset: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// The index an executor should use to satisfy a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexChoice {
    SymbolNameBtree,
    SymbolKindBtree,
    Bm25Content,
    TrigramNames,
}

impl IndexChoice {
    fn as_str(self) -> &'static str {
        match self {
            Self::SymbolNameBtree => "btree:symbols.name",
            Self::SymbolKindBtree => "btree:symbols.kind",
            Self::Bm25Content => "bm25_content",
            Self::TrigramNames => "trigram:symbol_names",
        }
    }

    /// Cost multiplier applied for `query_type` choosing this index —
    /// step 2 of the optimization pipeline.
    fn multiplier_for(self, query_type: QueryType) -> f64 {
        match (query_type, self) {
            (QueryType::Fuzzy, Self::TrigramNames) => 0.5,
            (QueryType::Fuzzy, _) => 2.0,
            (QueryType::Text, Self::Bm25Content) => 0.3,
            (QueryType::Text, _) => 3.0,
            (QueryType::Symbol, Self::SymbolNameBtree) => 0.8,
            _ => 1.0,
        }
    }
}

impl fmt::Display for IndexChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A step in an ordered `SearchPlan`.
#[derive(Debug, Clone)]
pub enum PlanStep {
    IndexScan { index: IndexChoice },
    Filter { field: String, value: String, selectivity: f64 },
    Limit { limit: usize, offset: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedCost {
    pub cpu: f64,
    pub io: f64,
    pub mem_mb: f64,
    pub time_ms: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub steps: Vec<PlanStep>,
    pub index_choice: IndexChoice,
    pub estimated_cost: EstimatedCost,
    pub cache_key: Option<String>,
    pub rewritten_text: String,
}

/// Default selectivity for a known filter field; unknown fields fall back to
/// 0.5 (the least selective default), matching the original's conservative
/// assumption for filters it's never seen.
fn default_selectivity(field: &str) -> f64 {
    match field {
        "file_path" => 0.01,
        "kind" => 0.1,
        "language" => 0.2,
        _ => 0.5,
    }
}

/// Rewrites query text by type — step 1 of the pipeline.
fn rewrite_text(query: &Query) -> String {
    match query.query_type {
        QueryType::Fuzzy => {
            if query.text.chars().count() < 3 {
                query.text.clone()
            } else {
                query.text.to_lowercase()
            }
        }
        QueryType::Text => {
            let words: Vec<&str> = query.text.split_whitespace().collect();
            let has_boolean = words
                .iter()
                .any(|w| matches!(w.to_uppercase().as_str(), "AND" | "OR" | "NOT"));
            if words.len() > 1 && !has_boolean {
                words
                    .iter()
                    .map(|w| format!("\"{w}\""))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            } else {
                query.text.clone()
            }
        }
        // `symbol` preserves case; splitting camelCase/snake_case into
        // variants is left to the caller, which knows whether the original
        // query already carries that information.
        _ => query.text.clone(),
    }
}

/// Selects the minimal-cost index for a query type — step 2.
fn select_index(query_type: QueryType) -> IndexChoice {
    let candidates = [
        IndexChoice::SymbolNameBtree,
        IndexChoice::SymbolKindBtree,
        IndexChoice::Bm25Content,
        IndexChoice::TrigramNames,
    ];
    candidates
        .into_iter()
        .min_by(|a, b| {
            a.multiplier_for(query_type)
                .partial_cmp(&b.multiplier_for(query_type))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(IndexChoice::SymbolNameBtree)
}

/// Orders filters by ascending selectivity (most selective first) — step 3.
fn order_filters(filters: &HashMap<String, String>) -> Vec<(String, String, f64)> {
    let mut ordered: Vec<(String, String, f64)> = filters
        .iter()
        .map(|(k, v)| (k.clone(), v.clone(), default_selectivity(k)))
        .collect();
    ordered.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    ordered
}

/// Decides whether a query's result is cacheable — step 4.
fn should_cache(query_type: QueryType, filters: &HashMap<String, String>) -> bool {
    matches!(query_type, QueryType::Semantic | QueryType::Text) || filters.is_empty()
}

const BASE_ROWS: f64 = 10_000.0;
const PER_ROW_CPU: f64 = 0.001;

/// Estimates cost for a plan — step 5.
fn estimate_cost(
    query_type: QueryType,
    index: IndexChoice,
    filters: &[(String, String, f64)],
) -> EstimatedCost {
    let selectivity = filters
        .iter()
        .map(|(_, _, s)| s)
        .fold(1.0_f64, |acc, s| acc * s);
    let type_multiplier = index.multiplier_for(query_type);

    let cpu = BASE_ROWS * selectivity * PER_ROW_CPU * type_multiplier;
    let rows = BASE_ROWS * selectivity;
    let io = (rows / 100.0).ceil();
    let mem_mb = rows * 0.001;
    let total_cost = cpu + io + mem_mb;
    let time_ms = total_cost * 10.0;

    let mut confidence = 1.0 - 0.05 * filters.len() as f64;
    if query_type.is_exotic() {
        confidence -= 0.2;
    }
    let confidence = confidence.clamp(0.1, 1.0);

    EstimatedCost {
        cpu,
        io,
        mem_mb,
        time_ms,
        confidence,
    }
}

/// `md5(type|text|sorted_filters|limit|offset)`.
fn cache_key_for(query: &Query, rewritten: &str, ordered_filters: &[(String, String, f64)]) -> String {
    let filters_part = ordered_filters
        .iter()
        .map(|(k, v, _)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    let raw = format!(
        "{}|{}|{}|{}|{}",
        query.query_type, rewritten, filters_part, query.limit, query.offset
    );
    let mut hasher = Md5::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One proposed index, ranked by `benefit / (creation_cost + maintenance_cost)`.
#[derive(Debug, Clone)]
pub struct IndexSuggestion {
    pub columns: Vec<String>,
    pub usage_count: u64,
    pub benefit: f64,
    pub creation_cost: f64,
    pub maintenance_cost: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    pub total_queries: u64,
    pub avg_response_time_ms: f64,
    pub cache_hit_rate: f64,
    pub index_usage: HashMap<String, u64>,
    pub query_pattern_counts: HashMap<String, u64>,
    recent_trend: VecDeque<f64>,
}

impl SearchStatistics {
    const TREND_WINDOW: usize = 100;
    const CACHE_HIT_DECAY: f64 = 0.9;

    fn record(&mut self, query_type: QueryType, index: IndexChoice, elapsed_ms: f64, cache_hit: bool, alpha: f64) {
        self.total_queries += 1;
        self.avg_response_time_ms = if self.total_queries == 1 {
            elapsed_ms
        } else {
            alpha * elapsed_ms + (1.0 - alpha) * self.avg_response_time_ms
        };

        let hit_value = if cache_hit { 1.0 } else { 0.0 };
        self.cache_hit_rate = if self.total_queries == 1 {
            hit_value
        } else {
            Self::CACHE_HIT_DECAY * self.cache_hit_rate + (1.0 - Self::CACHE_HIT_DECAY) * hit_value
        };

        *self.index_usage.entry(index.as_str().to_string()).or_insert(0) += 1;
        *self
            .query_pattern_counts
            .entry(query_type.as_str().to_string())
            .or_insert(0) += 1;

        self.recent_trend.push_back(elapsed_ms);
        if self.recent_trend.len() > Self::TREND_WINDOW {
            self.recent_trend.pop_front();
        }
    }

    /// Mean response time over at most the last 100 recorded queries.
    pub fn recent_trend_ms(&self) -> f64 {
        if self.recent_trend.is_empty() {
            return 0.0;
        }
        self.recent_trend.iter().sum::<f64>() / self.recent_trend.len() as f64
    }
}

/// A record of one historical query, kept for `suggest_indexes`.
#[derive(Debug, Clone)]
struct QueryHistoryEntry {
    query_type: QueryType,
    filter_columns: Vec<String>,
}

pub struct QueryOptimizer {
    config: OptimizerConfig,
    statistics: Mutex<SearchStatistics>,
    history: Mutex<Vec<QueryHistoryEntry>>,
    plan_cache: Mutex<lru::LruCache<String, SearchPlan>>,
}

impl QueryOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let cache_size = std::num::NonZeroUsize::new(config.plan_cache_size.max(1)).unwrap();
        Self {
            config,
            statistics: Mutex::new(SearchStatistics::default()),
            history: Mutex::new(Vec::new()),
            plan_cache: Mutex::new(lru::LruCache::new(cache_size)),
        }
    }

    /// Runs the full optimization pipeline and returns a `SearchPlan`,
    /// serving from the plan cache when the rewritten query, filters,
    /// limit, and offset all match a previously cached entry.
    pub fn optimize(&self, query: &Query) -> SearchPlan {
        let rewritten = rewrite_text(query);
        let ordered_filters = order_filters(&query.filters);
        let cacheable = should_cache(query.query_type, &query.filters);
        let cache_key = cacheable.then(|| cache_key_for(query, &rewritten, &ordered_filters));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.plan_cache.lock().get(key) {
                return cached.clone();
            }
        }

        let index = select_index(query.query_type);
        let estimated_cost = estimate_cost(query.query_type, index, &ordered_filters);

        let mut steps = vec![PlanStep::IndexScan { index }];
        for (field, value, selectivity) in &ordered_filters {
            steps.push(PlanStep::Filter {
                field: field.clone(),
                value: value.clone(),
                selectivity: *selectivity,
            });
        }
        steps.push(PlanStep::Limit {
            limit: query.limit,
            offset: query.offset,
        });

        let plan = SearchPlan {
            steps,
            index_choice: index,
            estimated_cost,
            cache_key: cache_key.clone(),
            rewritten_text: rewritten,
        };

        if let Some(key) = cache_key {
            self.plan_cache.lock().put(key, plan.clone());
        }

        self.history.lock().push(QueryHistoryEntry {
            query_type: query.query_type,
            filter_columns: query.filters.keys().cloned().collect(),
        });

        plan
    }

    /// Records a completed query's outcome into the running statistics.
    pub fn record_outcome(&self, query_type: QueryType, index: IndexChoice, elapsed_ms: f64, cache_hit: bool) {
        self.statistics
            .lock()
            .record(query_type, index, elapsed_ms, cache_hit, self.config.response_time_alpha);
    }

    pub fn statistics(&self) -> SearchStatistics {
        self.statistics.lock().clone()
    }

    /// Proposes up to 5 single- or multi-column indexes from the queries
    /// seen so far, ranked by `benefit / (creation_cost + maintenance_cost)`.
    pub fn suggest_indexes(&self) -> Vec<IndexSuggestion> {
        let history = self.history.lock();
        let mut usage: HashMap<Vec<String>, u64> = HashMap::new();
        for entry in history.iter() {
            if entry.filter_columns.is_empty() {
                continue;
            }
            let mut columns = entry.filter_columns.clone();
            columns.sort();
            *usage.entry(columns).or_insert(0) += 1;
        }

        let mut suggestions: Vec<IndexSuggestion> = usage
            .into_iter()
            .map(|(columns, usage_count)| {
                let benefit = usage_count as f64 * 10.0;
                let creation_cost = columns.len() as f64 * 5.0;
                let maintenance_cost = columns.len() as f64 * 1.0;
                let ratio = benefit / (creation_cost + maintenance_cost).max(0.001);
                IndexSuggestion {
                    columns,
                    usage_count,
                    benefit,
                    creation_cost,
                    maintenance_cost,
                    ratio,
                }
            })
            .collect();

        suggestions.sort_by(|a, b| b.ratio.partial_cmp(&a.ratio).unwrap_or(std::cmp::Ordering::Equal));
        suggestions.truncate(5);
        suggestions
    }
}

impl Clone for SearchStatistics {
    fn clone(&self) -> Self {
        Self {
            total_queries: self.total_queries,
            avg_response_time_ms: self.avg_response_time_ms,
            cache_hit_rate: self.cache_hit_rate,
            index_usage: self.index_usage.clone(),
            query_pattern_counts: self.query_pattern_counts.clone(),
            recent_trend: self.recent_trend.clone(),
        }
    }
}
