//! Directory traversal for discovering files to index.
//!
//! Grounded in the teacher's `indexing/walker.rs`: built on `ignore::WalkBuilder`
//! so `.gitignore`/global-gitignore/`.git/info/exclude` are respected for free,
//! with config-driven extension filtering layered on top.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;

pub struct FileWalker {
    settings: Arc<Settings>,
}

impl FileWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Walks `root`, yielding files whose extension matches an enabled
    /// language and that aren't excluded by gitignore, hidden-file rules,
    /// or `indexing.ignore_patterns`.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .max_depth(None)
            .require_git(false);

        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &self.settings.indexing.ignore_patterns {
            if let Err(e) = override_builder.add(&format!("!{pattern}")) {
                tracing::warn!("invalid ignore pattern '{pattern}': {e}");
            }
        }
        if let Ok(overrides) = override_builder.build() {
            builder.overrides(overrides);
        }

        let enabled_extensions = self.enabled_extensions();

        builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(move |entry| {
                let path = entry.path();
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
                {
                    return None;
                }
                let ext = path.extension()?.to_str()?;
                if enabled_extensions.contains(ext) {
                    Some(path.to_path_buf())
                } else {
                    None
                }
            })
    }

    fn enabled_extensions(&self) -> std::collections::HashSet<String> {
        self.settings
            .languages
            .values()
            .filter(|lang| lang.enabled)
            .flat_map(|lang| lang.extensions.iter().cloned())
            .collect()
    }

    pub fn count_files(&self, root: &Path) -> usize {
        self.walk(root).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings_with_rust_enabled() -> Arc<Settings> {
        let mut settings = Settings::default();
        settings.languages.get_mut("rust").unwrap().enabled = true;
        Arc::new(settings)
    }

    #[test]
    fn walks_only_enabled_language_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("lib.rs"), "pub fn lib() {}").unwrap();
        fs::write(root.join("test.py"), "def test(): pass").unwrap();
        fs::write(root.join("README.md"), "# Test").unwrap();

        let walker = FileWalker::new(settings_with_rust_enabled());
        let files: Vec<_> = walker.walk(root).collect();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn hidden_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".hidden.rs"), "fn hidden() {}").unwrap();
        fs::write(root.join("visible.rs"), "fn visible() {}").unwrap();

        let walker = FileWalker::new(settings_with_rust_enabled());
        let files: Vec<_> = walker.walk(root).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("visible.rs"));
    }

    #[test]
    fn gitignore_is_respected_without_a_git_repo() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), "ignored.rs\n").unwrap();
        fs::write(root.join("ignored.rs"), "fn ignored() {}").unwrap();
        fs::write(root.join("included.rs"), "fn included() {}").unwrap();

        let walker = FileWalker::new(settings_with_rust_enabled());
        let files: Vec<_> = walker.walk(root).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("included.rs"));
    }
}
