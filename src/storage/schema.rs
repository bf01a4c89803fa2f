//! Tantivy schema for the single on-disk index.
//!
//! One physical index holds six logical document kinds, discriminated by
//! `doc_type`: `repository`, `file`, `symbol`, `reference`, `bm25_document`,
//! and `metadata`. Keeping everything in one `Index` means one writer, one
//! reader, and one commit boundary instead of juggling several Tantivy
//! indices in lockstep.

use tantivy::schema::{
    FAST, Field, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder, TextFieldIndexing,
    TextOptions,
};

#[derive(Debug)]
pub struct IndexSchema {
    pub doc_type: Field,

    // Repository fields
    pub repository_id: Field,
    pub repository_path: Field,
    pub repository_name: Field,

    // File fields
    pub file_id: Field,
    pub file_repository_id: Field,
    pub file_path: Field,
    pub file_relative_path: Field,
    pub file_language: Field,
    pub file_hash: Field,
    pub file_mtime: Field,
    pub file_size: Field,

    // Symbol fields
    pub symbol_id: Field,
    pub name: Field,
    pub kind: Field,
    pub signature: Field,
    pub docstring: Field,
    pub line_number: Field,
    pub end_line_number: Field,

    // Reference fields
    pub ref_name: Field,
    pub ref_line: Field,

    // BM25 document fields (full-text body, separate from the symbol's own
    // searchable name/signature/docstring)
    pub doc_key: Field,
    pub content: Field,
    pub symbols_text: Field,

    // Metadata fields (counters, schema version, etc.)
    pub meta_key: Field,
    pub meta_value: Field,
}

impl IndexSchema {
    pub fn build() -> (Schema, IndexSchema) {
        let mut builder = SchemaBuilder::default();

        let doc_type = builder.add_text_field("doc_type", STRING | STORED | FAST);

        let repository_id = builder.add_u64_field("repository_id", STORED | FAST);
        let repository_path = builder.add_text_field("repository_path", STRING | STORED);
        let repository_name = builder.add_text_field("repository_name", STRING | STORED);

        let file_id = builder.add_u64_field("file_id", STORED | FAST);
        let file_repository_id = builder.add_u64_field("file_repository_id", STORED | FAST);
        let file_path = builder.add_text_field("file_path", STRING | STORED | FAST);
        let file_relative_path = builder.add_text_field("file_relative_path", STRING | STORED);
        let file_language = builder.add_text_field("file_language", STRING | STORED | FAST);
        let file_hash = builder.add_text_field("file_hash", STRING | STORED);
        let file_mtime = builder.add_u64_field("file_mtime", STORED | FAST);
        let file_size = builder.add_u64_field("file_size", STORED);

        let positions = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(crate::bm25::tokenizer::CODE_TOKENIZER_NAME)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let symbol_id = builder.add_u64_field("symbol_id", STORED | FAST);
        let name = builder.add_text_field("name", positions.clone());
        let kind = builder.add_text_field("kind", STRING | STORED | FAST);
        let signature = builder.add_text_field("signature", positions.clone());
        let docstring = builder.add_text_field("docstring", positions.clone());
        let line_number = builder.add_u64_field("line_number", STORED | FAST);
        let end_line_number = builder.add_u64_field("end_line_number", STORED);

        let ref_name = builder.add_text_field("ref_name", STRING | STORED | FAST);
        let ref_line = builder.add_u64_field("ref_line", STORED);

        let doc_key = builder.add_text_field("doc_key", STRING | STORED | FAST);
        let content = builder.add_text_field("content", positions.clone());
        let symbols_text = builder.add_text_field("symbols_text", positions);

        let meta_key = builder.add_text_field("meta_key", STRING | STORED | FAST);
        let meta_value = builder.add_u64_field("meta_value", STORED);

        let schema = builder.build();
        let index_schema = IndexSchema {
            doc_type,
            repository_id,
            repository_path,
            repository_name,
            file_id,
            file_repository_id,
            file_path,
            file_relative_path,
            file_language,
            file_hash,
            file_mtime,
            file_size,
            symbol_id,
            name,
            kind,
            signature,
            docstring,
            line_number,
            end_line_number,
            ref_name,
            ref_line,
            doc_key,
            content,
            symbols_text,
            meta_key,
            meta_value,
        };

        (schema, index_schema)
    }
}

/// String constants for the `doc_type` discriminator field.
pub mod doc_type {
    pub const REPOSITORY: &str = "repository";
    pub const FILE: &str = "file";
    pub const SYMBOL: &str = "symbol";
    pub const REFERENCE: &str = "reference";
    pub const BM25_DOCUMENT: &str = "bm25_document";
    pub const METADATA: &str = "metadata";
}
