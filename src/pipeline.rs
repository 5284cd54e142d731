//! Retrieval pipeline orchestration.
//!
//! The build path drives the whole flow: snapshot reconciliation → README
//! fetch → chunking → cache-checked embedding → vector index population.
//! The query path embeds the question through the same cache and model used
//! at index time (mismatched models would make the distances meaningless)
//! and returns ranked context for the external answering collaborator; no
//! generation happens here.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CachedEmbedder;
use crate::chunk::chunk_repo;
use crate::config::Config;
use crate::embedder::EmbeddingProvider;
use crate::github::StarSource;
use crate::index::VectorIndex;
use crate::models::{BuildReport, ContextHit, RepoRecord, TextChunk};
use crate::readme;
use crate::snapshot::{reconcile, SnapshotStore};

/// Run the build path end to end.
///
/// Only repositories not already present in the index contribute chunks,
/// so re-running against unchanged remote state writes nothing and performs
/// no README or listing-page calls. A build that completes with failed
/// README fetches is a success with a warning count, not a failure.
pub async fn run_build(
    config: &Config,
    source: Arc<dyn StarSource>,
    provider: Box<dyn EmbeddingProvider>,
) -> Result<BuildReport> {
    let mut report = BuildReport::default();

    let viewer = source.viewer().await.context("Failed to identify user")?;
    info!(user = %viewer.login, id = viewer.id, "starting build");

    let store = SnapshotStore::for_user(&config.snapshot_dir(), viewer.id);
    let (records, refetched) = reconcile(&store, source.as_ref()).await?;
    report.snapshot_rows = records.len();
    report.snapshot_refetched = refetched;

    let readme_dir = config.readme_dir();
    report.readmes = readme::fetch_missing(
        Arc::clone(&source),
        &readme_dir,
        &records,
        config.fetch.parallelism,
    )
    .await?;
    if report.readmes.warnings() > 0 {
        warn!(
            not_found = report.readmes.not_found,
            failed = report.readmes.failed,
            "build continuing with partial README coverage"
        );
    }

    let embedder = CachedEmbedder::open(&config.cache_db_path(), provider)
        .await
        .context("Failed to open embedding cache")?;
    let index = VectorIndex::open(&config.index_db_path())
        .await
        .context("Failed to open vector index")?;

    let indexed = index.indexed_repo_ids().await?;

    // Chunks for repositories the index has never seen; `add` is
    // append-only, so this is the de-duplication point.
    let mut pending: Vec<(TextChunk, RepoRecord)> = Vec::new();
    for record in &records {
        if indexed.contains(&record.id) {
            report.repos_already_indexed += 1;
            continue;
        }

        let readme_text = readme::read_cached(&readme_dir, record.id)?;
        if matches!(&readme_text, Some(text) if text.trim().is_empty()) {
            report.empty_readmes += 1;
        }

        let chunks = chunk_repo(record, readme_text.as_deref(), &config.chunking);
        if chunks.is_empty() {
            continue;
        }

        report.repos_indexed += 1;
        for chunk in chunks {
            pending.push((chunk, record.clone()));
        }
    }

    for batch in pending.chunks(config.embedder.batch_size) {
        let texts: Vec<String> = batch.iter().map(|(c, _)| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        let chunks: Vec<TextChunk> = batch.iter().map(|(c, _)| c.clone()).collect();
        let metas: Vec<RepoRecord> = batch.iter().map(|(_, r)| r.clone()).collect();
        index.add(&chunks, &vectors, &metas).await?;
        report.chunks_indexed += batch.len();
    }

    info!(
        repos = report.repos_indexed,
        chunks = report.chunks_indexed,
        "build complete"
    );
    Ok(report)
}

/// Run the query path: embed the query, search the index, return the top-k
/// chunks with their owning repository metadata.
pub async fn run_ask(
    config: &Config,
    provider: Box<dyn EmbeddingProvider>,
    query: &str,
    top_k: usize,
) -> Result<Vec<ContextHit>> {
    let embedder = CachedEmbedder::open(&config.cache_db_path(), provider)
        .await
        .context("Failed to open embedding cache")?;
    let index = VectorIndex::open(&config.index_db_path())
        .await
        .context("Failed to open vector index")?;

    if index.is_empty().await? {
        bail!("The vector index is empty. Run `stardex build` first.");
    }

    let query_vector = embedder.embed_query(query).await?;
    index.search(&query_vector, top_k).await
}

/// Return the cached README text for `owner/repo`, resolving the numeric
/// repository id through the persisted snapshots. No network calls.
pub async fn cached_readme(config: &Config, full_name: &str) -> Result<String> {
    let snapshot_dir = config.snapshot_dir();
    if !snapshot_dir.exists() {
        bail!("No snapshot found. Run `stardex build` first.");
    }

    let mut record: Option<RepoRecord> = None;
    for entry in std::fs::read_dir(&snapshot_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sqlite") {
            continue;
        }
        let store = SnapshotStore::at(path);
        if let Some(rows) = store.load().await? {
            record = rows.into_iter().find(|r| r.full_name == full_name);
            if record.is_some() {
                break;
            }
        }
    }

    let record = record
        .with_context(|| format!("Repository '{}' is not in the snapshot", full_name))?;

    match readme::read_cached(&config.readme_dir(), record.id)? {
        Some(text) => Ok(text),
        None => bail!("No cached README for '{}'", full_name),
    }
}
