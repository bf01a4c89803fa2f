use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, black_box, BenchmarkId, Criterion};
use tempfile::TempDir;

use codex_index::bm25::Bm25Index;
use codex_index::model::Bm25Document;
use codex_index::storage::DocumentIndex;

fn sample_document(i: usize) -> Bm25Document {
    Bm25Document {
        doc_key: format!("src/module_{i}.rs"),
        content: format!(
            "pub fn process_item_{i}(input: &str) -> Result<String, ParseError> {{\n\
             \x20\x20\x20\x20let tokens = tokenize(input);\n\
             \x20\x20\x20\x20validate_tokens(&tokens)?;\n\
             \x20\x20\x20\x20Ok(tokens.join(\" \"))\n}}\n"
        ),
        symbols: format!("process_item_{i} tokenize validate_tokens ParseError"),
        language: "rust".to_string(),
        metadata: HashMap::new(),
    }
}

fn seeded_storage(doc_count: usize) -> (TempDir, DocumentIndex) {
    let dir = TempDir::new().unwrap();
    let storage = DocumentIndex::open(dir.path().join("index")).unwrap();
    let bm25 = Bm25Index::new(&storage, 1.2, 0.75);

    storage.start_batch().unwrap();
    for i in 0..doc_count {
        bm25.add_document(&sample_document(i)).unwrap();
    }
    storage.commit_batch().unwrap();

    (dir, storage)
}

fn bench_bm25_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_search");

    for &doc_count in &[100usize, 1_000, 5_000] {
        let (_dir, storage) = seeded_storage(doc_count);
        let bm25 = Bm25Index::new(&storage, 1.2, 0.75);

        group.bench_with_input(BenchmarkId::new("term_query", doc_count), &doc_count, |b, _| {
            b.iter(|| black_box(bm25.search(black_box("process_item"), black_box(10)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("phrase_query", doc_count), &doc_count, |b, _| {
            b.iter(|| black_box(bm25.search_phrase(black_box(&["validate", "tokens"]), black_box(10)).unwrap()));
        });
    }

    group.finish();
}

fn bench_term_statistics(c: &mut Criterion) {
    let (_dir, storage) = seeded_storage(2_000);
    let bm25 = Bm25Index::new(&storage, 1.2, 0.75);

    c.bench_function("bm25_term_statistics", |b| {
        b.iter(|| black_box(bm25.term_statistics(black_box("tokenize")).unwrap()));
    });
}

criterion_group!(benches, bench_bm25_search, bench_term_statistics);
criterion_main!(benches);
