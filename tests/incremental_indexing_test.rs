//! A file indexed twice without changing its content hash should not grow
//! the symbol count, and re-indexing after a real edit should replace the
//! old symbols rather than append to them.

use std::collections::HashMap;

use codex_index::config::Settings;
use codex_index::context::IndexContext;
use codex_index::engine::{IndexEngine, IndexOptions};
use codex_index::fuzzy::FuzzyIndex;
use codex_index::storage::DocumentIndex;
use codex_index::types::RepositoryId;
use tempfile::TempDir;

fn settings_with_rust_enabled() -> Settings {
    let mut settings = Settings::default();
    settings.languages.get_mut("rust").unwrap().enabled = true;
    settings
}

fn new_engine(ctx: &IndexContext) -> IndexEngine {
    IndexEngine::new(ctx.clone(), FuzzyIndex::new(), RepositoryId::new(1).unwrap())
}

#[test]
fn reindexing_unchanged_file_does_not_duplicate_symbols() {
    let src = TempDir::new().unwrap();
    let file_path = src.path().join("lib.rs");
    std::fs::write(&file_path, "pub fn main() {}\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let engine = new_engine(&ctx);

    engine.index_file(&file_path, &IndexOptions::default()).unwrap();
    let after_first = ctx.storage.get_statistics().unwrap();
    assert_eq!(after_first.symbol_count, 1);

    engine.index_file(&file_path, &IndexOptions::default()).unwrap();
    let after_second = ctx.storage.get_statistics().unwrap();
    assert_eq!(after_second.symbol_count, after_first.symbol_count);
}

#[test]
fn editing_a_file_replaces_its_symbols_instead_of_appending() {
    let src = TempDir::new().unwrap();
    let file_path = src.path().join("lib.rs");
    std::fs::write(&file_path, "pub fn foo() {}\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let engine = new_engine(&ctx);

    engine.index_file(&file_path, &IndexOptions::default()).unwrap();
    assert_eq!(ctx.storage.get_statistics().unwrap().symbol_count, 1);

    std::fs::write(&file_path, "pub fn foo() {}\npub fn bar() {}\npub fn baz() {}\n").unwrap();
    engine.index_file(&file_path, &IndexOptions::default()).unwrap();
    assert_eq!(ctx.storage.get_statistics().unwrap().symbol_count, 3);
}

#[test]
fn editing_a_file_does_not_leave_a_stale_bm25_document_row() {
    let src = TempDir::new().unwrap();
    let file_path = src.path().join("lib.rs");
    std::fs::write(&file_path, "pub fn foo() {}\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let engine = new_engine(&ctx);

    engine.index_file(&file_path, &IndexOptions::default()).unwrap();
    assert_eq!(ctx.storage.get_statistics().unwrap().bm25_document_count, 1);

    std::fs::write(&file_path, "pub fn foo() {}\npub fn bar() {}\n").unwrap();
    engine.index_file(&file_path, &IndexOptions::default()).unwrap();
    assert_eq!(ctx.storage.get_statistics().unwrap().bm25_document_count, 1);
}

#[test]
fn explicit_removal_of_a_files_documents_drops_its_symbols() {
    let src = TempDir::new().unwrap();
    std::fs::write(src.path().join("a.rs"), "pub fn alpha() {}\n").unwrap();
    std::fs::write(src.path().join("b.rs"), "pub fn beta() {}\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(store_dir.path().join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let repo_id = ctx.storage.create_repository(src.path().to_str().unwrap(), "src", &HashMap::new()).unwrap();
    let engine = IndexEngine::new(ctx.clone(), FuzzyIndex::new(), repo_id);

    let batch = engine.index_directory(src.path(), &IndexOptions::default()).unwrap();
    assert_eq!(batch.failed, 0);
    assert_eq!(ctx.storage.get_statistics().unwrap().symbol_count, 2);

    let removed_path = src.path().join("b.rs").to_string_lossy().to_string();
    std::fs::remove_file(&removed_path).unwrap();
    ctx.storage.remove_file_documents(&removed_path).unwrap();
    assert_eq!(ctx.storage.get_statistics().unwrap().symbol_count, 1);
}
