//! Layered configuration for the indexing and search engine.
//!
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CODEX_` and use double
//! underscores to separate nested levels:
//! - `CODEX_ENGINE__PARALLEL_THREADS=8` sets `engine.parallel_threads`
//! - `CODEX_HYBRID__CACHE_SIZE=512` sets `hybrid.cache_size`
//! - `CODEX_INDEXING__INCLUDE_TESTS=false` sets `indexing.include_tests`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the index directory.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub languages: HashMap<String, LanguageConfig>,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub reranker: RerankerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub include_tests: bool,

    #[serde(default = "default_false")]
    pub include_docs: bool,

    /// BM25 `k1` term-frequency saturation parameter.
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,

    /// BM25 `b` length-normalization parameter.
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LanguageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub extractor_options: HashMap<String, serde_json::Value>,
}

/// Worker-pool and task-queue tuning for the Index Engine.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Maximum number of queued tasks before submissions are rejected with
    /// `IndexError::QueueFull`.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Window, in files, over which identical paths are coalesced into a
    /// single reindex task.
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window: usize,

    /// Smoothing factor for the progress throughput EMA.
    #[serde(default = "default_progress_alpha")]
    pub progress_alpha: f64,
}

/// Query Optimizer tuning, grounded in the original `query_optimizer.py`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OptimizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entries kept in the query-plan cache.
    #[serde(default = "default_plan_cache_size")]
    pub plan_cache_size: usize,

    /// Smoothing factor for the response-time EMA used by cost estimates.
    #[serde(default = "default_response_time_alpha")]
    pub response_time_alpha: f64,
}

/// Hybrid Search fusion and result-cache tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HybridConfig {
    /// RRF's rank-offset constant; 60 is the value from the reference paper.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,

    #[serde(default = "default_fuzzy_weight")]
    pub fuzzy_weight: f32,

    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Entries kept in the LRU result cache.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// How many of the fused results get handed to the reranker; results
    /// past this rank keep their fused ordering unchanged.
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
}

/// Reranker backend selection.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RerankerConfig {
    /// One of "none", "tfidf", "cross-encoder", "external", "hybrid".
    #[serde(default = "default_reranker_backend")]
    pub backend: String,

    /// Base URL for the "external" backend; requires the `reranker-remote`
    /// feature.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Falls back to `RUST_LOG`, then this value, in that precedence order.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json: bool,
}

fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".codex-index/index")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_queue_capacity() -> usize {
    4096
}
fn default_coalesce_window() -> usize {
    256
}
fn default_progress_alpha() -> f64 {
    0.3
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_bm25_k1() -> f32 {
    1.2
}
fn default_bm25_b() -> f32 {
    0.75
}
fn default_plan_cache_size() -> usize {
    256
}
fn default_response_time_alpha() -> f64 {
    0.3
}
fn default_rrf_k() -> u32 {
    60
}
fn default_bm25_weight() -> f32 {
    1.0
}
fn default_fuzzy_weight() -> f32 {
    0.5
}
fn default_semantic_weight() -> f32 {
    0.0
}
fn default_cache_size() -> usize {
    512
}
fn default_rerank_top_k() -> usize {
    20
}
fn default_reranker_backend() -> String {
    "tfidf".to_string()
}
fn default_rerank_timeout_ms() -> u64 {
    2_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            indexing: IndexingConfig::default(),
            languages: default_languages(),
            engine: EngineConfig::default(),
            optimizer: OptimizerConfig::default(),
            hybrid: HybridConfig::default(),
            reranker: RerankerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: vec![
                "target/**".to_string(),
                "node_modules/**".to_string(),
                ".git/**".to_string(),
                "*.generated.*".to_string(),
            ],
            include_tests: true,
            include_docs: false,
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            queue_capacity: default_queue_capacity(),
            coalesce_window: default_coalesce_window(),
            progress_alpha: default_progress_alpha(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plan_cache_size: default_plan_cache_size(),
            response_time_alpha: default_response_time_alpha(),
        }
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            bm25_weight: default_bm25_weight(),
            fuzzy_weight: default_fuzzy_weight(),
            semantic_weight: default_semantic_weight(),
            cache_size: default_cache_size(),
            rerank_top_k: default_rerank_top_k(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            backend: default_reranker_backend(),
            endpoint: None,
            timeout_ms: default_rerank_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_languages() -> HashMap<String, LanguageConfig> {
    let mut langs = HashMap::new();

    langs.insert(
        "rust".to_string(),
        LanguageConfig {
            enabled: true,
            extensions: vec!["rs".to_string()],
            extractor_options: HashMap::new(),
        },
    );

    langs
}

impl Settings {
    /// Load configuration from all sources: defaults, then workspace
    /// config file, then `CODEX_`-prefixed environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".codex-index/settings.toml"));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(
                Env::prefixed("CODEX_").map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
    }

    /// Find the workspace root by searching upward for `.codex-index`.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".codex-index");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }
        None
    }

    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".codex-index");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }
        None
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CODEX_").split("__"))
            .extract()
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(".codex-index/settings.toml");
        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }
        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
