//! Export/import round trip: a compatible archive installs cleanly, and an
//! incompatible one (different embedding-model metadata) is recognized as
//! such before anything on disk is touched, mirroring the decision the CLI's
//! `index import` makes between refusing, `--force`, and `--auto-reindex`.

use std::collections::HashMap;

use codex_index::archive::{self, EmbeddingModelMeta, IndexMetadata, IndexStatsMeta};
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

fn build_repo_dir(repo_root: &std::path::Path, data_root: &std::path::Path) -> IndexMetadata {
    std::fs::write(repo_root.join("lib.rs"), "pub fn gamma() {}\n").unwrap();

    let storage = DocumentIndex::open(data_root.join("index")).unwrap();
    let ctx = IndexContext::new(settings_with_rust_enabled(), storage);
    let repo_id = ctx
        .storage
        .create_repository(repo_root.to_str().unwrap(), "repo", &HashMap::new())
        .unwrap();
    let engine = IndexEngine::new(ctx.clone(), FuzzyIndex::new(), repo_id);
    let batch = engine.index_directory(repo_root, &IndexOptions::default()).unwrap();
    assert_eq!(batch.failed, 0);

    let metadata = IndexMetadata::new(repo_root.to_string_lossy(), "full");
    metadata.save(&data_root.join("index_metadata.json")).unwrap();
    metadata
}

#[test]
fn compatible_archive_round_trips_symbol_data() {
    let repo_root = TempDir::new().unwrap();
    let source_data = TempDir::new().unwrap();
    build_repo_dir(repo_root.path(), source_data.path());

    let archive_dir = TempDir::new().unwrap();
    let archive_path = archive_dir.path().join("export.tar.gz");
    let metadata = IndexMetadata::load(&source_data.path().join("index_metadata.json")).unwrap();
    archive::export(source_data.path(), &metadata, &archive_path, false).unwrap();

    let peeked = archive::peek_metadata(&archive_path).unwrap();
    assert_eq!(peeked.embedding_model.compatibility_hash, metadata.embedding_model.compatibility_hash);

    let restore_data = TempDir::new().unwrap();
    archive::extract(&archive_path, restore_data.path()).unwrap();

    let restored_storage = DocumentIndex::open(restore_data.path().join("index")).unwrap();
    let stats = restored_storage.get_statistics().unwrap();
    assert_eq!(stats.symbol_count, 1);
}

#[test]
fn incompatible_embedding_model_is_detected_before_extraction() {
    let repo_root = TempDir::new().unwrap();
    let source_data = TempDir::new().unwrap();
    build_repo_dir(repo_root.path(), source_data.path());

    let mut incompatible_metadata = IndexMetadata::load(&source_data.path().join("index_metadata.json")).unwrap();
    incompatible_metadata.embedding_model = EmbeddingModelMeta {
        model_name: "bge-small".to_string(),
        provider: "local".to_string(),
        dimension: 384,
        normalize: true,
        compatibility_hash: archive::compatibility_hash("bge-small", 384, "local", true),
    };
    incompatible_metadata.index_stats = IndexStatsMeta {
        semantic_search_enabled: true,
        indexing_mode: "full".to_string(),
    };
    incompatible_metadata.save(&source_data.path().join("index_metadata.json")).unwrap();

    let archive_dir = TempDir::new().unwrap();
    let archive_path = archive_dir.path().join("export.tar.gz");
    archive::export(source_data.path(), &incompatible_metadata, &archive_path, false).unwrap();

    let existing_metadata = IndexMetadata::new(repo_root.path().to_string_lossy(), "full");
    let incoming_metadata = archive::peek_metadata(&archive_path).unwrap();

    assert_ne!(
        existing_metadata.embedding_model.compatibility_hash,
        incoming_metadata.embedding_model.compatibility_hash
    );
}
