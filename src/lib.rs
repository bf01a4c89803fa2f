pub mod archive;
pub mod bm25;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fuzzy;
pub mod hybrid;
pub mod logging;
pub mod model;
pub mod optimizer;
pub mod reranker;
pub mod storage;
pub mod types;

pub use config::Settings;
pub use context::IndexContext;
pub use engine::{BatchResult, FileIndexResult, IndexEngine, IndexOptions, IndexStatus};
pub use error::{IndexError, IndexResult};
pub use hybrid::{EnabledSources, HybridHit, HybridSearch, SemanticHit, SemanticProvider, SourceWeights};
pub use model::{File, IndexProgress, Reference, Repository, Symbol};
pub use optimizer::{Query, QueryOptimizer, QueryType, SearchPlan};
pub use storage::DocumentIndex;
pub use types::{FileId, RepositoryId, SymbolId, SymbolKind};
