//! Portable archive export/import for one repository's index: a gzip tar
//! carrying the Tantivy segment directory plus an `index_metadata.json`
//! compatibility envelope, grounded in the teacher's `storage/persistence.rs`
//! write-to-temp-then-rename discipline and its `index_data.rs` metadata
//! envelope shape.

use std::fs::{self, File as StdFile};
use std::io::Read as _;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tar::{Archive, Builder};

use crate::error::{IndexError, IndexResult};

/// Envelope version. Bumped when the archive layout changes incompatibly.
pub const FORMAT_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelMeta {
    pub model_name: String,
    pub provider: String,
    pub dimension: u32,
    pub normalize: bool,
    pub compatibility_hash: String,
}

impl EmbeddingModelMeta {
    /// The configuration this crate ships today: no dense-vector embedder,
    /// symbol/BM25 search only. `index verify --check-compatibility` and
    /// `index import` still exercise the full hash machinery against it.
    pub fn none() -> Self {
        let model_name = "none".to_string();
        let provider = "none".to_string();
        let dimension = 0;
        let normalize = false;
        let compatibility_hash = compatibility_hash(&model_name, dimension, &provider, normalize);
        Self {
            model_name,
            provider,
            dimension,
            normalize,
            compatibility_hash,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatsMeta {
    pub semantic_search_enabled: bool,
    pub indexing_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub version: String,
    pub timestamp: String,
    pub created_by: String,
    pub path: String,
    pub embedding_model: EmbeddingModelMeta,
    pub index_stats: IndexStatsMeta,
}

impl IndexMetadata {
    pub fn new(source_path: impl Into<String>, indexing_mode: impl Into<String>) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            created_by: format!("codex-index/{}", env!("CARGO_PKG_VERSION")),
            path: source_path.into(),
            embedding_model: EmbeddingModelMeta::none(),
            index_stats: IndexStatsMeta {
                semantic_search_enabled: false,
                indexing_mode: indexing_mode.into(),
            },
        }
    }

    pub fn load(path: &Path) -> IndexResult<Self> {
        let data = fs::read(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_slice(&data).map_err(|e| IndexError::LoadError {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    /// Write to a temp file, then rename, so a crash mid-write never leaves a
    /// half-written envelope.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| IndexError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| IndexError::PersistenceError {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| IndexError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, path).map_err(|e| IndexError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// First 16 hex characters of `SHA-256("model_name|dimension|provider|normalize")`.
pub fn compatibility_hash(model_name: &str, dimension: u32, provider: &str, normalize: bool) -> String {
    let raw = format!("{model_name}|{dimension}|{provider}|{normalize}");
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect::<String>()[..16].to_string()
}

/// `code-index-<model>-<dim>d-v<version>-<UTC stamp>.tar.gz`
pub fn archive_filename(metadata: &IndexMetadata, utc_stamp: &str) -> String {
    format!(
        "code-index-{}-{}d-v{}-{}.tar.gz",
        metadata.embedding_model.model_name, metadata.embedding_model.dimension, metadata.version, utc_stamp
    )
}

fn tar_err(path: &Path, e: impl std::error::Error + Send + Sync + 'static) -> IndexError {
    IndexError::PersistenceError {
        path: path.to_path_buf(),
        source: Box::new(e),
    }
}

/// Packs `repo_dir` (expected to contain an `index/` Tantivy directory and
/// optionally a `vector/` directory) plus `metadata` into a gzip tar at
/// `out_path`. Writes `index_metadata.json` into `repo_dir` as a side effect,
/// so a subsequent `index verify --check-compatibility` sees the same
/// envelope that was exported.
pub fn export(repo_dir: &Path, metadata: &IndexMetadata, out_path: &Path, include_embeddings: bool) -> IndexResult<()> {
    let metadata_path = repo_dir.join("index_metadata.json");
    metadata.save(&metadata_path)?;

    let out_file = StdFile::create(out_path).map_err(|e| IndexError::FileWrite {
        path: out_path.to_path_buf(),
        source: e,
    })?;
    let encoder = GzEncoder::new(out_file, Compression::default());
    let mut builder = Builder::new(encoder);

    let index_dir = repo_dir.join("index");
    if index_dir.is_dir() {
        builder.append_dir_all("code_index.db", &index_dir).map_err(|e| tar_err(out_path, e))?;
    }

    let vector_dir = repo_dir.join("vector");
    if include_embeddings && vector_dir.is_dir() {
        builder.append_dir_all("vector", &vector_dir).map_err(|e| tar_err(out_path, e))?;
    }

    builder
        .append_path_with_name(&metadata_path, "index_metadata.json")
        .map_err(|e| tar_err(out_path, e))?;

    let encoder = builder.into_inner().map_err(|e| tar_err(out_path, e))?;
    encoder.finish().map_err(|e| tar_err(out_path, e))?;
    Ok(())
}

/// Reads just `index_metadata.json` out of an archive, without extracting
/// anything else, so callers can make a compatibility decision before
/// touching the target directory.
pub fn peek_metadata(archive_path: &Path) -> IndexResult<IndexMetadata> {
    let file = StdFile::open(archive_path).map_err(|e| IndexError::FileRead {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive.entries().map_err(|e| tar_err(archive_path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| tar_err(archive_path, e))?;
        let is_metadata = entry
            .path()
            .map(|p| p.as_ref() == Path::new("index_metadata.json"))
            .unwrap_or(false);
        if is_metadata {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(|e| tar_err(archive_path, e))?;
            return serde_json::from_slice(&buf).map_err(|e| IndexError::LoadError {
                path: archive_path.to_path_buf(),
                source: Box::new(e),
            });
        }
    }
    Err(IndexError::LoadError {
        path: archive_path.to_path_buf(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "archive has no index_metadata.json",
        )),
    })
}

/// Extracts an archive into `repo_dir`, replacing `index/`, `vector/`, and
/// `index_metadata.json` wholesale. Callers resolve the compatibility
/// decision (force / auto-reindex / refuse) before calling this.
pub fn extract(archive_path: &Path, repo_dir: &Path) -> IndexResult<()> {
    fs::create_dir_all(repo_dir).map_err(|e| IndexError::FileWrite {
        path: repo_dir.to_path_buf(),
        source: e,
    })?;

    let file = StdFile::open(archive_path).map_err(|e| IndexError::FileRead {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive.entries().map_err(|e| tar_err(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| tar_err(archive_path, e))?;
        let entry_path = entry.path().map_err(|e| tar_err(archive_path, e))?.into_owned();

        let dest = if let Ok(rest) = entry_path.strip_prefix("code_index.db") {
            repo_dir.join("index").join(rest)
        } else if entry_path.starts_with("vector") {
            repo_dir.join(&entry_path)
        } else if entry_path == Path::new("index_metadata.json") {
            repo_dir.join("index_metadata.json")
        } else {
            continue;
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| IndexError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        entry.unpack(&dest).map_err(|e| tar_err(&dest, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn compatibility_hash_is_stable_and_sixteen_hex_chars() {
        let a = compatibility_hash("none", 0, "none", false);
        let b = compatibility_hash("none", 0, "none", false);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn compatibility_hash_differs_on_dimension() {
        let a = compatibility_hash("bge-small", 384, "local", true);
        let b = compatibility_hash("bge-small", 768, "local", true);
        assert_ne!(a, b);
    }

    #[test]
    fn metadata_round_trips_through_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index_metadata.json");
        let metadata = IndexMetadata::new("/repo/src", "full");
        metadata.save(&path).unwrap();

        let loaded = IndexMetadata::load(&path).unwrap();
        assert_eq!(loaded.path, "/repo/src");
        assert_eq!(loaded.version, FORMAT_VERSION);
        assert_eq!(
            loaded.embedding_model.compatibility_hash,
            metadata.embedding_model.compatibility_hash
        );
    }

    #[test]
    fn export_then_peek_metadata_recovers_the_same_envelope() {
        let repo_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(repo_dir.path().join("index")).unwrap();
        std::fs::write(repo_dir.path().join("index").join("meta.json"), b"{}").unwrap();

        let out_dir = TempDir::new().unwrap();
        let out_path = out_dir.path().join("archive.tar.gz");
        let metadata = IndexMetadata::new("/repo/src", "full");

        export(repo_dir.path(), &metadata, &out_path, false).unwrap();
        assert!(out_path.exists());

        let peeked = peek_metadata(&out_path).unwrap();
        assert_eq!(peeked.path, "/repo/src");
    }

    #[test]
    fn export_then_extract_round_trips_index_contents() {
        let repo_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(repo_dir.path().join("index")).unwrap();
        std::fs::write(repo_dir.path().join("index").join("segment.bin"), b"fake-segment").unwrap();

        let out_dir = TempDir::new().unwrap();
        let out_path = out_dir.path().join("archive.tar.gz");
        let metadata = IndexMetadata::new("/repo/src", "full");
        export(repo_dir.path(), &metadata, &out_path, false).unwrap();

        let restore_dir = TempDir::new().unwrap();
        extract(&out_path, restore_dir.path()).unwrap();

        assert!(restore_dir.path().join("index").join("segment.bin").exists());
        assert!(restore_dir.path().join("index_metadata.json").exists());
    }
}
