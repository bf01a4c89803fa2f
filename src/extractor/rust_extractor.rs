//! Tree-sitter-backed extractor for Rust source, grounded in the teacher's
//! `parsing/rust.rs` tree walk (function/struct/trait/impl handling,
//! doc-comment scanning) but narrowed to the symbol-only surface
//! `SymbolExtractor` requires.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use tree_sitter::{Node, Parser};

use crate::error::{ParseError, ParseResult};
use crate::extractor::{
    Definition, ExtractedFile, ExtractedSymbol, ReferenceLocation, SearchOptions, SnippetHit,
    SymbolExtractor,
};
use crate::types::{SymbolKind, known_kind};

const MAX_AST_DEPTH: usize = 512;

/// One symbol remembered across calls, used to answer `get_definition` /
/// `find_references` without re-parsing.
#[derive(Debug, Clone)]
struct SeenSymbol {
    kind: SymbolKind,
    signature: Option<String>,
    doc: Option<String>,
    file: String,
    line: u32,
    span: (usize, usize),
}

pub struct RustExtractor {
    /// name -> most recently seen definition; `index_file` is expected to be
    /// called once per file during a build, so "most recent" is "current".
    seen: Mutex<HashMap<String, SeenSymbol>>,
    references: Mutex<HashMap<String, Vec<ReferenceLocation>>>,
}

impl Default for RustExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RustExtractor {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            references: Mutex::new(HashMap::new()),
        }
    }

    fn make_parser() -> ParseResult<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| ParseError::ExtractorInit {
                language: "rust".to_string(),
                reason: e.to_string(),
            })?;
        Ok(parser)
    }

    fn extract_doc_comment(node: Node, code: &str) -> Option<String> {
        let mut lines = Vec::new();
        let mut sibling = node.prev_sibling();
        while let Some(n) = sibling {
            if n.kind() == "line_comment" {
                let text = &code[n.byte_range()];
                if let Some(doc) = text.strip_prefix("///") {
                    lines.push(doc.trim().to_string());
                    sibling = n.prev_sibling();
                    continue;
                }
            }
            break;
        }
        if lines.is_empty() {
            None
        } else {
            lines.reverse();
            Some(lines.join("\n"))
        }
    }

    fn node_text<'a>(node: Node, code: &'a str) -> &'a str {
        &code[node.byte_range()]
    }

    fn signature_for(node: Node, code: &str) -> Option<String> {
        let header_end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or(node.end_byte());
        let text = code[node.start_byte()..header_end].trim();
        if text.is_empty() {
            None
        } else {
            Some(text.lines().next().unwrap_or(text).trim().to_string())
        }
    }

    fn walk(
        node: Node,
        code: &str,
        depth: usize,
        symbols: &mut Vec<ExtractedSymbol>,
        in_impl: bool,
    ) -> ParseResult<()> {
        if depth > MAX_AST_DEPTH {
            return Err(ParseError::RecursionLimit {
                max_depth: MAX_AST_DEPTH,
            });
        }

        match node.kind() {
            "function_item" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let kind = if in_impl {
                        known_kind::METHOD
                    } else {
                        known_kind::FUNCTION
                    };
                    symbols.push(ExtractedSymbol {
                        name: Self::node_text(name_node, code).to_string(),
                        kind: SymbolKind::new(kind),
                        signature: Self::signature_for(node, code),
                        line: (node.start_position().row + 1) as u32,
                        end_line: Some((node.end_position().row + 1) as u32),
                        span: (node.start_byte(), node.end_byte()),
                        metadata: doc_metadata(Self::extract_doc_comment(node, code)),
                    });
                }
            }
            "struct_item" => push_named(node, code, known_kind::STRUCT, symbols),
            "enum_item" => push_named(node, code, known_kind::ENUM, symbols),
            "trait_item" => push_named(node, code, known_kind::TRAIT, symbols),
            "mod_item" => push_named(node, code, known_kind::MODULE, symbols),
            "const_item" => push_named(node, code, known_kind::CONSTANT, symbols),
            "type_item" => push_named(node, code, known_kind::TYPE_ALIAS, symbols),
            "macro_definition" => push_named(node, code, known_kind::MACRO, symbols),
            _ => {}
        }

        let now_in_impl = in_impl || node.kind() == "impl_item";
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::walk(child, code, depth + 1, symbols, now_in_impl)?;
        }
        Ok(())
    }
}

fn push_named(node: Node, code: &str, kind: &str, symbols: &mut Vec<ExtractedSymbol>) {
    if let Some(name_node) = node.child_by_field_name("name") {
        symbols.push(ExtractedSymbol {
            name: RustExtractor::node_text(name_node, code).to_string(),
            kind: SymbolKind::new(kind),
            signature: RustExtractor::signature_for(node, code),
            line: (node.start_position().row + 1) as u32,
            end_line: Some((node.end_position().row + 1) as u32),
            span: (node.start_byte(), node.end_byte()),
            metadata: doc_metadata(RustExtractor::extract_doc_comment(node, code)),
        });
    }
}

fn doc_metadata(doc: Option<String>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(doc) = doc {
        map.insert("doc".to_string(), doc);
    }
    map
}

impl SymbolExtractor for RustExtractor {
    fn supports(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("rs")
    }

    fn index_file(&self, path: &Path, content: &str) -> ParseResult<ExtractedFile> {
        let mut parser = Self::make_parser()?;
        let tree = parser.parse(content, None).ok_or(ParseError::SyntaxError {
            line: 0,
            column: 0,
            reason: "tree-sitter failed to produce a parse tree".to_string(),
        })?;

        let mut symbols = Vec::new();
        Self::walk(tree.root_node(), content, 0, &mut symbols, false)?;

        let file_name = path.to_string_lossy().to_string();
        {
            let mut seen = self.seen.lock().expect("rust extractor seen mutex poisoned");
            for sym in &symbols {
                seen.insert(
                    sym.name.clone(),
                    SeenSymbol {
                        kind: sym.kind.clone(),
                        signature: sym.signature.clone(),
                        doc: sym.metadata.get("doc").cloned(),
                        file: file_name.clone(),
                        line: sym.line,
                        span: sym.span,
                    },
                );
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert("symbol_count".to_string(), symbols.len().to_string());

        Ok(ExtractedFile {
            language: "rust".to_string(),
            symbols,
            metadata,
        })
    }

    fn get_definition(&self, name: &str) -> Option<Definition> {
        let seen = self.seen.lock().expect("rust extractor seen mutex poisoned");
        seen.get(name).map(|s| Definition {
            symbol: name.to_string(),
            kind: s.kind.clone(),
            language: "rust".to_string(),
            signature: s.signature.clone(),
            doc: s.doc.clone(),
            defined_in: s.file.clone(),
            line: s.line,
            span: s.span,
        })
    }

    fn find_references(&self, name: &str) -> Vec<ReferenceLocation> {
        self.references
            .lock()
            .expect("rust extractor references mutex poisoned")
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn search(&self, query: &str, opts: &SearchOptions) -> Vec<SnippetHit> {
        let query_norm = if opts.case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };
        let limit = if opts.limit == 0 { 20 } else { opts.limit };

        let seen = self.seen.lock().expect("rust extractor seen mutex poisoned");
        seen.iter()
            .filter(|(name, _)| {
                let candidate = if opts.case_sensitive {
                    (*name).clone()
                } else {
                    name.to_lowercase()
                };
                candidate.contains(&query_norm)
            })
            .take(limit)
            .map(|(name, s)| SnippetHit {
                file: s.file.clone(),
                line: s.line,
                snippet: s.signature.clone().unwrap_or_else(|| name.clone()),
            })
            .collect()
    }

    fn language_name(&self) -> &'static str {
        "rust"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_functions_structs_and_traits() {
        let extractor = RustExtractor::new();
        let code = r#"
/// Adds two numbers.
fn add(a: i32, b: i32) -> i32 {
    a + b
}

struct Point {
    x: i32,
    y: i32,
}

trait Shape {
    fn area(&self) -> f64;
}
"#;
        let file = extractor
            .index_file(&PathBuf::from("src/lib.rs"), code)
            .unwrap();
        let names: Vec<&str> = file.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"add"));
        assert!(names.contains(&"Point"));
        assert!(names.contains(&"Shape"));

        let add = file.symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.kind.as_str(), known_kind::FUNCTION);
        assert_eq!(add.metadata.get("doc").map(String::as_str), Some("Adds two numbers."));
    }

    #[test]
    fn methods_inside_impl_blocks_are_tagged_method() {
        let extractor = RustExtractor::new();
        let code = r#"
struct Counter(i32);

impl Counter {
    fn increment(&mut self) {
        self.0 += 1;
    }
}
"#;
        let file = extractor
            .index_file(&PathBuf::from("src/counter.rs"), code)
            .unwrap();
        let increment = file.symbols.iter().find(|s| s.name == "increment").unwrap();
        assert_eq!(increment.kind.as_str(), known_kind::METHOD);
    }

    #[test]
    fn get_definition_resolves_after_index_file() {
        let extractor = RustExtractor::new();
        extractor
            .index_file(&PathBuf::from("src/lib.rs"), "fn parse() {}\n")
            .unwrap();
        let def = extractor.get_definition("parse").unwrap();
        assert_eq!(def.defined_in, "src/lib.rs");
        assert_eq!(def.kind.as_str(), known_kind::FUNCTION);
    }

    #[test]
    fn supports_only_rs_extension() {
        let extractor = RustExtractor::new();
        assert!(extractor.supports(&PathBuf::from("src/lib.rs")));
        assert!(!extractor.supports(&PathBuf::from("src/lib.py")));
    }
}
