//! Generic regex-based fallback extractor for any language without a
//! dedicated plugin. Finds common definition shapes (`def`/`function`/
//! `class`/`fn`/`func` keywords) well enough to populate search and the
//! fuzzy index, without claiming full symbol fidelity.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use regex::Regex;

use crate::error::ParseResult;
use crate::extractor::{
    Definition, ExtractedFile, ExtractedSymbol, ReferenceLocation, SearchOptions, SnippetHit,
    SymbolExtractor,
};
use crate::types::{SymbolKind, known_kind};

struct DefinitionPattern {
    regex: Regex,
    kind: &'static str,
}

fn definition_patterns() -> Vec<DefinitionPattern> {
    vec![
        DefinitionPattern {
            regex: Regex::new(r"(?m)^\s*(?:pub\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            kind: known_kind::FUNCTION,
        },
        DefinitionPattern {
            regex: Regex::new(r"(?m)^\s*def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            kind: known_kind::FUNCTION,
        },
        DefinitionPattern {
            regex: Regex::new(r"(?m)^\s*(?:export\s+)?function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            kind: known_kind::FUNCTION,
        },
        DefinitionPattern {
            regex: Regex::new(r"(?m)^\s*func\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            kind: known_kind::FUNCTION,
        },
        DefinitionPattern {
            regex: Regex::new(r"(?m)^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            kind: known_kind::CLASS,
        },
        DefinitionPattern {
            regex: Regex::new(r"(?m)^\s*interface\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            kind: known_kind::INTERFACE,
        },
    ]
}

struct SeenSymbol {
    kind: SymbolKind,
    file: String,
    line: u32,
    span: (usize, usize),
}

pub struct GenericRegexExtractor {
    patterns: Vec<DefinitionPattern>,
    seen: Mutex<HashMap<String, SeenSymbol>>,
}

impl Default for GenericRegexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericRegexExtractor {
    pub fn new() -> Self {
        Self {
            patterns: definition_patterns(),
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn line_of(content: &str, byte_offset: usize) -> u32 {
        content[..byte_offset.min(content.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count() as u32
            + 1
    }
}

impl SymbolExtractor for GenericRegexExtractor {
    /// The fallback, so it claims everything the extractor registry hasn't
    /// already matched with a more specific plugin.
    fn supports(&self, _path: &Path) -> bool {
        true
    }

    fn index_file(&self, path: &Path, content: &str) -> ParseResult<ExtractedFile> {
        let mut symbols = Vec::new();
        for pattern in &self.patterns {
            for captures in pattern.regex.captures_iter(content) {
                let Some(name_match) = captures.get(1) else {
                    continue;
                };
                let whole = captures.get(0).unwrap();
                symbols.push(ExtractedSymbol {
                    name: name_match.as_str().to_string(),
                    kind: SymbolKind::new(pattern.kind),
                    signature: Some(whole.as_str().trim().to_string()),
                    line: Self::line_of(content, whole.start()),
                    end_line: None,
                    span: (whole.start(), whole.end()),
                    metadata: HashMap::new(),
                });
            }
        }

        let file_name = path.to_string_lossy().to_string();
        {
            let mut seen = self.seen.lock().expect("regex extractor seen mutex poisoned");
            for sym in &symbols {
                seen.insert(
                    sym.name.clone(),
                    SeenSymbol {
                        kind: sym.kind.clone(),
                        file: file_name.clone(),
                        line: sym.line,
                        span: sym.span,
                    },
                );
            }
        }

        let language = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut metadata = HashMap::new();
        metadata.insert("symbol_count".to_string(), symbols.len().to_string());

        Ok(ExtractedFile {
            language,
            symbols,
            metadata,
        })
    }

    fn get_definition(&self, name: &str) -> Option<Definition> {
        let seen = self.seen.lock().expect("regex extractor seen mutex poisoned");
        seen.get(name).map(|s| Definition {
            symbol: name.to_string(),
            kind: s.kind.clone(),
            language: "generic".to_string(),
            signature: None,
            doc: None,
            defined_in: s.file.clone(),
            line: s.line,
            span: s.span,
        })
    }

    fn find_references(&self, _name: &str) -> Vec<ReferenceLocation> {
        // The regex fallback has no call-graph awareness; references are
        // left to the Fuzzy/BM25 indices.
        Vec::new()
    }

    fn search(&self, query: &str, opts: &SearchOptions) -> Vec<SnippetHit> {
        let query_norm = query.to_lowercase();
        let limit = if opts.limit == 0 { 20 } else { opts.limit };
        let seen = self.seen.lock().expect("regex extractor seen mutex poisoned");
        seen.iter()
            .filter(|(name, _)| name.to_lowercase().contains(&query_norm))
            .take(limit)
            .map(|(name, s)| SnippetHit {
                file: s.file.clone(),
                line: s.line,
                snippet: name.clone(),
            })
            .collect()
    }

    fn language_name(&self) -> &'static str {
        "generic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn matches_python_function_definitions() {
        let extractor = GenericRegexExtractor::new();
        let file = extractor
            .index_file(&PathBuf::from("app.py"), "def handle_request(req):\n    pass\n")
            .unwrap();
        assert_eq!(file.symbols.len(), 1);
        assert_eq!(file.symbols[0].name, "handle_request");
        assert_eq!(file.symbols[0].kind.as_str(), known_kind::FUNCTION);
    }

    #[test]
    fn matches_javascript_class_and_function() {
        let extractor = GenericRegexExtractor::new();
        let file = extractor
            .index_file(
                &PathBuf::from("widget.js"),
                "class Widget {}\nfunction render(w) {}\n",
            )
            .unwrap();
        let names: Vec<&str> = file.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"render"));
    }

    #[test]
    fn supports_always_returns_true() {
        let extractor = GenericRegexExtractor::new();
        assert!(extractor.supports(&PathBuf::from("anything.xyz")));
    }
}
