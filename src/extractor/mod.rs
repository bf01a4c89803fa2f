//! Symbol-Extractor Interface: the one seam where language-specific parsing
//! plugs into an otherwise language-agnostic core. Narrowed from the
//! teacher's much richer `LanguageParser` trait (cross-file call/impl/use
//! graph extraction is out of scope here) down to exactly what the Storage
//! Layer and Index Engine need.

pub mod regex_extractor;
pub mod rust_extractor;

use std::collections::HashMap;
use std::path::Path;

use crate::error::ParseResult;
use crate::types::SymbolKind;

pub use regex_extractor::GenericRegexExtractor;
pub use rust_extractor::RustExtractor;

/// One extracted symbol, file-relative and not yet assigned a `SymbolId` —
/// that happens once the Index Engine merges it into the Storage Layer.
#[derive(Debug, Clone)]
pub struct ExtractedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    pub line: u32,
    pub end_line: Option<u32>,
    pub span: (usize, usize),
    pub metadata: HashMap<String, String>,
}

/// Result of extracting symbols from one file.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub language: String,
    pub symbols: Vec<ExtractedSymbol>,
    pub metadata: HashMap<String, String>,
}

/// A resolved definition, as returned by [`SymbolExtractor::get_definition`].
#[derive(Debug, Clone)]
pub struct Definition {
    pub symbol: String,
    pub kind: SymbolKind,
    pub language: String,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub defined_in: String,
    pub line: u32,
    pub span: (usize, usize),
}

/// One textual reference location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLocation {
    pub file: String,
    pub line: u32,
}

/// One in-file snippet search hit.
#[derive(Debug, Clone)]
pub struct SnippetHit {
    pub file: String,
    pub line: u32,
    pub snippet: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub limit: usize,
}

/// Every language plugin implements this trait. The core never inspects a
/// plugin's internals — it treats `kind` as an opaque string end to end.
pub trait SymbolExtractor: Send + Sync {
    /// Whether this extractor claims the given file path.
    fn supports(&self, path: &Path) -> bool;

    /// Extracts all symbols (and optional file-level metadata) from one
    /// file's content.
    fn index_file(&self, path: &Path, content: &str) -> ParseResult<ExtractedFile>;

    /// Resolves a definition by name within this plugin's already-seen
    /// symbols. `None` if the plugin has not indexed a matching symbol.
    fn get_definition(&self, name: &str) -> Option<Definition>;

    /// Textual reference locations for a name, independent of `get_definition`.
    fn find_references(&self, name: &str) -> Vec<ReferenceLocation>;

    /// Plugin-local snippet search, used as a fallback when the Fuzzy/BM25
    /// indices are unavailable.
    fn search(&self, query: &str, opts: &SearchOptions) -> Vec<SnippetHit>;

    /// The language name this plugin reports in `ExtractedFile::language`.
    fn language_name(&self) -> &'static str;
}

/// Picks the first registered extractor whose `supports()` matches.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn SymbolExtractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registers the built-in Rust extractor plus the generic regex fallback,
    /// in that order, so Rust files get the precise tree-sitter extractor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RustExtractor::new()));
        registry.register(Box::new(GenericRegexExtractor::new()));
        registry
    }

    pub fn register(&mut self, extractor: Box<dyn SymbolExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn find_for(&self, path: &Path) -> Option<&dyn SymbolExtractor> {
        self.extractors
            .iter()
            .find(|e| e.supports(path))
            .map(|e| e.as_ref())
    }
}
