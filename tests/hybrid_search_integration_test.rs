//! Hybrid Search over a freshly built index: BM25 and the Fuzzy Index fan
//! out, Reciprocal Rank Fusion merges them, and a symbol-name hit that
//! appears in both sources should outrank a BM25-only body match.

use codex_index::config::Settings;
use codex_index::context::IndexContext;
use codex_index::engine::{IndexEngine, IndexOptions};
use codex_index::fuzzy::FuzzyIndex;
use codex_index::hybrid::{EnabledSources, HybridSearch, SourceWeights};
use codex_index::storage::DocumentIndex;
use codex_index::types::RepositoryId;
use tempfile::TempDir;

fn settings_with_rust_enabled() -> Settings {
    let mut settings = Settings::default();
    settings.languages.get_mut("rust").unwrap().enabled = true;
    settings
}

#[test]
fn symbol_name_match_outranks_body_only_match() {
    let src = TempDir::new().unwrap();
    std::fs::write(
        src.path().join("parser.rs"),
        "pub fn parse_json(input: &str) -> Result<(), String> {\n    Ok(())\n}\n",
    )
    .unwrap();
    std::fs::write(
        src.path().join("notes.rs"),
        "// remember to eventually parse json configs from disk\npub fn load_config() {}\n",
    )
    .unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let engine = IndexEngine::new(ctx.clone(), FuzzyIndex::new(), RepositoryId::new(1).unwrap());

    let batch = engine.index_directory(src.path(), &IndexOptions::default()).unwrap();
    assert_eq!(batch.failed, 0);

    let search = HybridSearch::new(ctx.storage.clone(), engine.fuzzy_index(), ctx.settings.hybrid.clone());
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
    assert!(hits[0].file_path.ends_with("parser.rs"));
}

#[test]
fn disabling_fuzzy_still_returns_bm25_hits() {
    let src = TempDir::new().unwrap();
    std::fs::write(src.path().join("lib.rs"), "pub fn compute_total(items: &[i32]) -> i32 { 0 }\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let engine = IndexEngine::new(ctx.clone(), FuzzyIndex::new(), RepositoryId::new(1).unwrap());
    engine.index_directory(src.path(), &IndexOptions::default()).unwrap();

    let search = HybridSearch::new(ctx.storage.clone(), engine.fuzzy_index(), ctx.settings.hybrid.clone());
    let hits = search.search(
        "compute_total",
        10,
        EnabledSources {
            bm25: true,
            semantic: false,
            fuzzy: false,
        },
        SourceWeights {
            bm25: 1.0,
            semantic: 0.0,
            fuzzy: 0.0,
        },
    );

    assert!(!hits.is_empty());
}

#[test]
fn reindexing_a_changed_file_updates_search_results() {
    let src = TempDir::new().unwrap();
    let file_path = src.path().join("lib.rs");
    std::fs::write(&file_path, "pub fn alpha() {}\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let engine = IndexEngine::new(ctx.clone(), FuzzyIndex::new(), RepositoryId::new(1).unwrap());
    engine.index_directory(src.path(), &IndexOptions::default()).unwrap();

    std::fs::write(&file_path, "pub fn alpha() {}\npub fn beta() {}\n").unwrap();
    engine.index_file(&file_path, &IndexOptions::default()).unwrap();

    let search = HybridSearch::new(ctx.storage.clone(), engine.fuzzy_index(), ctx.settings.hybrid.clone());
    let hits = search.search(
        "beta",
        10,
        EnabledSources::default(),
        SourceWeights {
            bm25: 1.0,
            semantic: 0.0,
            fuzzy: 1.0,
        },
    );
    assert!(!hits.is_empty());
}
