pub mod document_index;
pub mod persistence;
pub mod schema;

pub use document_index::{DocumentIndex, FullTextHit, IndexStatistics, ReferenceHit, SymbolHit};
pub use persistence::FuzzySnapshot;
