//! In-memory, persisted, trigram-aware substring index.
//!
//! Grounded directly in `fuzzy_indexer.py`: a `path → [(line, text)]` map for
//! content lines and a `lower(name) → [FuzzyEntry]` map for symbol names.
//! Adds an optional trigram posting-list pre-filter — supplementing the
//! original's linear scan to bound cost on large corpora — but always
//! produces the same substring matches the linear scan would.

use std::collections::HashMap;

use crate::model::FuzzyEntry;

/// One line-level hit from [`FuzzyIndex::search_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    pub file: String,
    pub line: u32,
    pub snippet: String,
}

/// In-memory substring index over file content and symbol names.
pub struct FuzzyIndex {
    content: HashMap<String, Vec<(u32, String)>>,
    /// First-insertion order of `content`'s keys, mirroring the original's
    /// dict-insertion-order iteration; a key's position never moves once set.
    content_order: Vec<String>,
    by_name: HashMap<String, Vec<FuzzyEntry>>,
    /// First-insertion order of `by_name`'s keys, same reasoning.
    name_order: Vec<String>,
    /// trigram -> set of lower-cased names containing it; narrows
    /// `search_names` before the substring scan on large corpora.
    trigrams: HashMap<[u8; 3], std::collections::HashSet<String>>,
}

impl Default for FuzzyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self {
            content: HashMap::new(),
            content_order: Vec::new(),
            by_name: HashMap::new(),
            name_order: Vec::new(),
            trigrams: HashMap::new(),
        }
    }

    pub fn from_entries(entries: Vec<FuzzyEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    /// Adds a file's content lines to the substring index, replacing any
    /// previous entry for the same path.
    pub fn add_file(&mut self, path: &str, content: &str) {
        let lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| ((i + 1) as u32, line.trim_end().to_string()))
            .collect();
        if !self.content.contains_key(path) {
            self.content_order.push(path.to_string());
        }
        self.content.insert(path.to_string(), lines);
    }

    pub fn remove_file(&mut self, path: &str) {
        self.content.remove(path);
        self.content_order.retain(|p| p != path);
        for entries in self.by_name.values_mut() {
            entries.retain(|e| e.file != path);
        }
    }

    /// Adds one symbol-name entry, indexing its trigrams for prefiltering.
    pub fn insert(&mut self, entry: FuzzyEntry) {
        let key = entry.name.to_lowercase();
        for trigram in trigrams_of(&key) {
            self.trigrams.entry(trigram).or_default().insert(key.clone());
        }
        if !self.by_name.contains_key(&key) {
            self.name_order.push(key.clone());
        }
        self.by_name.entry(key).or_default().push(entry);
    }

    /// All entries, flattened, for persistence snapshots.
    pub fn entries(&self) -> Vec<FuzzyEntry> {
        self.by_name.values().flatten().cloned().collect()
    }

    /// Case-insensitive substring search over indexed symbol names, ordered
    /// by insertion as in the original.
    pub fn search_names(&self, query: &str, limit: usize) -> Vec<FuzzyEntry> {
        let query_lower = query.to_lowercase();
        let mut results = Vec::new();

        let allowed: Option<std::collections::HashSet<String>> = if query_lower.len() >= 3 {
            self.candidate_names(&query_lower)
        } else {
            None
        };

        for key in &self.name_order {
            if let Some(allowed) = &allowed {
                if !allowed.contains(key) {
                    continue;
                }
            }
            if !key.contains(&query_lower) {
                continue;
            }
            if let Some(entries) = self.by_name.get(key) {
                for entry in entries {
                    results.push(entry.clone());
                    if results.len() >= limit {
                        return results;
                    }
                }
            }
        }
        results
    }

    /// Case-insensitive substring search over file content lines.
    pub fn search_content(&self, query: &str, limit: usize) -> Vec<ContentMatch> {
        let query_lower = query.to_lowercase();
        let mut results = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for file in &self.content_order {
            let Some(lines) = self.content.get(file) else {
                continue;
            };
            for (line_no, text) in lines {
                if text.to_lowercase().contains(&query_lower) {
                    let key = (file.clone(), *line_no);
                    if seen.contains(&key) {
                        continue;
                    }
                    seen.insert(key);
                    results.push(ContentMatch {
                        file: file.clone(),
                        line: *line_no,
                        snippet: text.trim().to_string(),
                    });
                    if results.len() >= limit {
                        return results;
                    }
                }
            }
        }
        results
    }

    /// Returns the set of candidate names sharing at least one trigram with
    /// `query`. `None` means every trigram of the query is unindexed (the
    /// caller should fall back to a full scan, since a short/rare query
    /// could still match names the prefilter has no posting list for).
    fn candidate_names(&self, query_lower: &str) -> Option<std::collections::HashSet<String>> {
        let mut iter = trigrams_of(query_lower).into_iter();
        let first = iter.next()?;
        let mut candidates = self.trigrams.get(&first)?.clone();
        for trigram in iter {
            if let Some(set) = self.trigrams.get(&trigram) {
                candidates.retain(|c| set.contains(c));
            } else {
                return Some(std::collections::HashSet::new());
            }
        }
        Some(candidates)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.by_name.is_empty()
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.content_order.clear();
        self.by_name.clear();
        self.name_order.clear();
        self.trigrams.clear();
    }
}

fn trigrams_of(s: &str) -> Vec<[u8; 3]> {
    let bytes = s.as_bytes();
    if bytes.len() < 3 {
        return Vec::new();
    }
    bytes.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_content_is_case_insensitive_and_deduped() {
        let mut index = FuzzyIndex::new();
        index.add_file("src/lib.rs", "fn Parse() {}\nfn other() {}\n");
        let hits = index.search_content("parse", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 1);
    }

    #[test]
    fn search_names_matches_substring_regardless_of_case() {
        let mut index = FuzzyIndex::new();
        index.insert(FuzzyEntry {
            name: "ParseJson".to_string(),
            file: "src/parser.rs".to_string(),
            line: 10,
            metadata: None,
        });
        let hits = index.search_names("json", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "ParseJson");
    }

    #[test]
    fn remove_file_drops_its_content_and_name_entries() {
        let mut index = FuzzyIndex::new();
        index.add_file("src/a.rs", "fn foo() {}\n");
        index.insert(FuzzyEntry {
            name: "foo".to_string(),
            file: "src/a.rs".to_string(),
            line: 1,
            metadata: None,
        });
        index.remove_file("src/a.rs");
        assert!(index.search_content("foo", 10).is_empty());
        assert!(index.search_names("foo", 10).is_empty());
    }

    #[test]
    fn reload_failure_never_panics_caller_gets_empty_index() {
        // FuzzyIndex::new() stands in for "reload failed"; the storage layer
        // is responsible for catching the load error and falling back here.
        let index = FuzzyIndex::new();
        assert!(index.is_empty());
        assert!(index.search_names("anything", 10).is_empty());
    }

    #[test]
    fn search_names_preserves_insertion_order_under_a_limit() {
        let mut index = FuzzyIndex::new();
        for name in ["zebra_widget", "apple_widget", "mango_widget"] {
            index.insert(FuzzyEntry {
                name: name.to_string(),
                file: "src/lib.rs".to_string(),
                line: 1,
                metadata: None,
            });
        }
        let hits = index.search_names("widget", 2);
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zebra_widget", "apple_widget"]);
    }

    #[test]
    fn search_content_preserves_file_insertion_order_under_a_limit() {
        let mut index = FuzzyIndex::new();
        index.add_file("z.rs", "needle here\n");
        index.add_file("a.rs", "needle here too\n");
        let hits = index.search_content("needle", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "z.rs");
    }
}
