use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use codex_index::archive::{self, IndexMetadata};
use codex_index::config::Settings;
use codex_index::context::IndexContext;
use codex_index::engine::{IndexEngine, IndexOptions};
use codex_index::error::IndexError;
use codex_index::fuzzy::FuzzyIndex;
use codex_index::storage::{DocumentIndex, FuzzySnapshot};

#[derive(Parser)]
#[command(name = "codex-index")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A local, language-aware code indexing and search engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a configuration file at `.codex-index/settings.toml`
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Build, update, verify, export, or import an index
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },

    /// Print the active configuration
    Config,
}

#[derive(Subcommand)]
enum IndexCommand {
    /// Full or incremental index of a directory
    Build {
        /// Directory to index
        path: PathBuf,

        /// Reindex every file even if its content hash hasn't changed
        #[arg(long)]
        force: bool,

        /// Glob of paths to skip, in addition to `indexing.ignore_patterns`.
        /// May be repeated.
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },

    /// Incremental reindex of an explicit file list
    Update {
        /// Comma-separated file paths to reindex
        #[arg(long = "files", value_delimiter = ',', required = true)]
        files: Vec<PathBuf>,

        /// Commit SHA this update corresponds to, logged but not verified
        #[arg(long)]
        commit: Option<String>,
    },

    /// Integrity and metadata checks
    Verify {
        /// Directory the index was built from (defaults to the current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Recompute and compare the embedding-model compatibility hash
        #[arg(long)]
        check_compatibility: bool,
    },

    /// Emit a portable archive of the index
    Export {
        /// Destination archive path
        out: PathBuf,

        /// Directory the index was built from (defaults to the current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Carry dense-vector embeddings, if any are present
        #[arg(long)]
        include_embeddings: bool,
    },

    /// Install a portable archive, checking embedding-model compatibility first
    Import {
        /// Archive path produced by `index export`
        archive: PathBuf,

        /// Directory to import into (defaults to the archive's recorded source path)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Import even if the archive's embedding model is incompatible
        #[arg(long)]
        force: bool,

        /// Rebuild from source instead of refusing on an incompatible archive
        #[arg(long)]
        auto_reindex: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}, falling back to defaults");
        Settings::default()
    });
    codex_index::logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Init { force } => run_init(force),
        Commands::Config => run_config(&settings),
        Commands::Index { command } => run_index(command, settings),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run_init(force: bool) -> anyhow::Result<ExitCode> {
    let path = Settings::init_config_file(force).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("wrote configuration to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_config(settings: &Settings) -> anyhow::Result<ExitCode> {
    println!("{}", toml::to_string_pretty(settings)?);
    Ok(ExitCode::SUCCESS)
}

fn run_index(command: IndexCommand, settings: Settings) -> anyhow::Result<ExitCode> {
    match command {
        IndexCommand::Build { path, force, exclude } => run_build(path, force, exclude, settings),
        IndexCommand::Update { files, commit } => run_update(files, commit, settings),
        IndexCommand::Verify { path, check_compatibility } => run_verify(path, check_compatibility),
        IndexCommand::Export { out, path, include_embeddings } => run_export(out, path, include_embeddings),
        IndexCommand::Import { archive, path, force, auto_reindex } => {
            run_import(archive, path, force, auto_reindex, settings)
        }
    }
}

/// Root of all per-repository index data. `INDEX_DATA_ROOT` overrides the
/// default, matching spec.md §6's environment variable.
fn data_root() -> PathBuf {
    std::env::var("INDEX_DATA_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".codex-index/data"))
}

/// Stable, path-derived slug used to namespace one repository's directory
/// under the data root. Sixteen hex characters of the path's SHA-256, so
/// repeated `index build` calls for the same directory land in the same
/// place without needing a separate on-disk registry to look the slug up.
fn repo_slug(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn repo_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn repo_dir_for(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    data_root().join(repo_slug(&canonical))
}

/// Opens the Storage Layer and reloads the Fuzzy Index snapshot for a
/// repository directory, creating both if this is the first build.
fn open_context(repo_dir: &Path, settings: Settings) -> anyhow::Result<(IndexContext, FuzzyIndex)> {
    let storage = DocumentIndex::open(repo_dir.join("index"))?;
    let snapshot = FuzzySnapshot::new(repo_dir.to_path_buf());
    let fuzzy = if snapshot.exists() {
        snapshot.load().unwrap_or_default()
    } else {
        FuzzyIndex::new()
    };
    Ok((IndexContext::new(settings, storage), fuzzy))
}

fn exit_for_batch(successful: usize, failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else if successful > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn run_build(path: PathBuf, force: bool, exclude: Vec<String>, mut settings: Settings) -> anyhow::Result<ExitCode> {
    settings.indexing.ignore_patterns.extend(exclude);

    let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
    let repo_dir = repo_dir_for(&canonical);
    std::fs::create_dir_all(&repo_dir)?;

    let (ctx, fuzzy) = open_context(&repo_dir, settings)?;
    let repo_id = ctx.storage.create_repository(&canonical.to_string_lossy(), &repo_name(&canonical), &HashMap::new())?;

    let engine = IndexEngine::new(ctx, fuzzy, repo_id);
    let options = IndexOptions {
        force_reindex: force,
        ..IndexOptions::default()
    };
    let batch = engine.index_directory(&canonical, &options)?;

    FuzzySnapshot::new(repo_dir.clone()).save(&engine.fuzzy_index().lock())?;
    IndexMetadata::new(canonical.to_string_lossy(), "full").save(&repo_dir.join("index_metadata.json"))?;

    println!(
        "indexed {} file(s): {} ok, {} failed, {} ms",
        batch.total_files, batch.successful, batch.failed, batch.total_duration_ms
    );
    for err in &batch.errors {
        eprintln!("  {err}");
    }

    Ok(exit_for_batch(batch.successful, batch.failed))
}

fn run_update(files: Vec<PathBuf>, commit: Option<String>, settings: Settings) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir()?;
    let repo_dir = repo_dir_for(&cwd);
    if !repo_dir.join("index").exists() {
        anyhow::bail!("no existing index for '{}'; run 'index build' first", cwd.display());
    }
    if let Some(commit) = &commit {
        tracing::info!(commit = %commit, "incremental update");
    }

    let (ctx, fuzzy) = open_context(&repo_dir, settings)?;
    let repo_id = ctx.storage.create_repository(&cwd.to_string_lossy(), &repo_name(&cwd), &HashMap::new())?;
    let engine = IndexEngine::new(ctx, fuzzy, repo_id);
    let options = IndexOptions {
        force_reindex: true,
        ..IndexOptions::default()
    };

    let mut successful = 0usize;
    let mut failed = 0usize;
    for file in &files {
        let result = engine.index_file(file, &options)?;
        if result.success {
            successful += 1;
        } else {
            failed += 1;
            if let Some(err) = &result.error {
                eprintln!("  {}: {err}", result.file_path);
            }
        }
    }

    FuzzySnapshot::new(repo_dir.clone()).save(&engine.fuzzy_index().lock())?;

    println!("updated {} file(s): {} ok, {} failed", files.len(), successful, failed);
    Ok(exit_for_batch(successful, failed))
}

fn run_verify(path: Option<PathBuf>, check_compatibility: bool) -> anyhow::Result<ExitCode> {
    let root = path.unwrap_or(std::env::current_dir()?);
    let canonical = root.canonicalize().unwrap_or(root);
    let repo_dir = repo_dir_for(&canonical);

    if !repo_dir.join("index").exists() {
        eprintln!("no index found for '{}'", canonical.display());
        return Ok(ExitCode::from(1));
    }

    let storage = DocumentIndex::open(repo_dir.join("index"))?;
    let stats = storage.get_statistics()?;
    println!(
        "repositories={} files={} symbols={} references={} bm25_documents={}",
        stats.repository_count, stats.file_count, stats.symbol_count, stats.reference_count, stats.bm25_document_count
    );

    if check_compatibility {
        let metadata = IndexMetadata::load(&repo_dir.join("index_metadata.json"))?;
        let expected = archive::compatibility_hash(
            &metadata.embedding_model.model_name,
            metadata.embedding_model.dimension,
            &metadata.embedding_model.provider,
            metadata.embedding_model.normalize,
        );
        if expected != metadata.embedding_model.compatibility_hash {
            eprintln!(
                "compatibility mismatch: recorded hash {} does not match recomputed hash {expected}",
                metadata.embedding_model.compatibility_hash
            );
            return Ok(ExitCode::from(1));
        }
        println!("compatibility hash ok ({})", metadata.embedding_model.compatibility_hash);
    }

    Ok(ExitCode::SUCCESS)
}

fn run_export(out: PathBuf, path: Option<PathBuf>, include_embeddings: bool) -> anyhow::Result<ExitCode> {
    let root = path.unwrap_or(std::env::current_dir()?);
    let canonical = root.canonicalize().unwrap_or(root);
    let repo_dir = repo_dir_for(&canonical);

    if !repo_dir.join("index").exists() {
        anyhow::bail!("no index found for '{}'; run 'index build' first", canonical.display());
    }

    let metadata_path = repo_dir.join("index_metadata.json");
    let metadata = if metadata_path.exists() {
        IndexMetadata::load(&metadata_path)?
    } else {
        IndexMetadata::new(canonical.to_string_lossy(), "full")
    };

    archive::export(&repo_dir, &metadata, &out, include_embeddings)?;
    println!("exported archive to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

fn run_import(
    archive_path: PathBuf,
    path: Option<PathBuf>,
    force: bool,
    auto_reindex: bool,
    settings: Settings,
) -> anyhow::Result<ExitCode> {
    let incoming = archive::peek_metadata(&archive_path)?;

    let target_root = path.unwrap_or_else(|| PathBuf::from(&incoming.path));
    let canonical = target_root.canonicalize().unwrap_or_else(|_| target_root.clone());
    let repo_dir = repo_dir_for(&canonical);

    let existing_metadata_path = repo_dir.join("index_metadata.json");
    let compatible = if existing_metadata_path.exists() {
        let current = IndexMetadata::load(&existing_metadata_path)?;
        current.embedding_model.compatibility_hash == incoming.embedding_model.compatibility_hash
    } else {
        true
    };

    if !compatible && !force && !auto_reindex {
        let current = IndexMetadata::load(&existing_metadata_path)?;
        let err = IndexError::ImportIncompatible {
            path: archive_path.clone(),
            expected: current.embedding_model.compatibility_hash,
            found: incoming.embedding_model.compatibility_hash,
            expected_dimension: current.embedding_model.dimension,
            found_dimension: incoming.embedding_model.dimension,
        };
        for suggestion in err.recovery_suggestions() {
            eprintln!("  hint: {suggestion}");
        }
        eprintln!("error: {err}");
        return Ok(ExitCode::from(1));
    }

    archive::extract(&archive_path, &repo_dir)?;
    println!("imported archive into {}", repo_dir.display());

    if !compatible && auto_reindex {
        println!("embedding model changed; rebuilding from '{}' (--auto-reindex)", incoming.path);
        let source = PathBuf::from(&incoming.path);
        let (ctx, fuzzy) = open_context(&repo_dir, settings)?;
        let repo_id = ctx.storage.create_repository(&incoming.path, &repo_name(&source), &HashMap::new())?;
        let engine = IndexEngine::new(ctx, fuzzy, repo_id);
        let batch = engine.index_directory(&source, &IndexOptions::default())?;
        FuzzySnapshot::new(repo_dir.clone()).save(&engine.fuzzy_index().lock())?;
        IndexMetadata::new(incoming.path.clone(), "full").save(&repo_dir.join("index_metadata.json"))?;
        println!(
            "reindexed {} file(s): {} ok, {} failed",
            batch.total_files, batch.successful, batch.failed
        );
    }

    Ok(ExitCode::SUCCESS)
}
