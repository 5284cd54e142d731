//! Core data models used throughout stardex.
//!
//! These types represent the repository metadata, text chunks, and retrieval
//! results that flow through the build and query pipeline.

use serde::{Deserialize, Serialize};

/// Metadata for one starred repository, as recorded in the snapshot.
///
/// Immutable once fetched; a stale snapshot is replaced wholesale rather
/// than patched row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Stable numeric repository id assigned by GitHub.
    pub id: i64,
    /// `owner/name`.
    pub full_name: String,
    pub description: Option<String>,
    /// ISO-8601 text, kept exactly as the API reports it.
    pub created_at: String,
    pub topics: Vec<String>,
}

/// Where a chunk's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// The repository description, indexed as a single chunk.
    Description,
    /// One segment of the repository README.
    ReadmeSegment,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Description => "description",
            ChunkKind::ReadmeSegment => "readme_segment",
        }
    }
}

/// A bounded segment of source text, the unit of embedding and retrieval.
///
/// Identity is `(repo_id, kind, chunk_index)` and is fully re-derivable
/// from the same input text; chunk derivation uses no randomness.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub repo_id: i64,
    pub chunk_index: i64,
    pub kind: ChunkKind,
    pub text: String,
}

/// One ranked piece of supporting context returned from the query path.
#[derive(Debug, Clone, Serialize)]
pub struct ContextHit {
    pub text: String,
    /// Cosine similarity against the query, higher is closer.
    pub score: f32,
    pub repo: RepoRecord,
}

/// Aggregate outcome of one README fetch batch.
///
/// Per-repository failures are counted here instead of aborting the batch,
/// so a build that completes with gaps is a success with a warning count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// READMEs fetched and written during this run.
    pub fetched: usize,
    /// Repositories whose README file already existed; no network call made.
    pub skipped: usize,
    /// Repositories with no README (expected, non-fatal).
    pub not_found: usize,
    /// Transient failures that exhausted their retries.
    pub failed: usize,
}

impl FetchReport {
    pub fn warnings(&self) -> usize {
        self.not_found + self.failed
    }
}

/// Summary of one end-to-end build run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildReport {
    pub snapshot_rows: usize,
    /// True when the snapshot was stale and rebuilt from the remote list.
    pub snapshot_refetched: bool,
    pub readmes: FetchReport,
    pub repos_indexed: usize,
    pub chunks_indexed: usize,
    /// Repositories skipped because the index already contains them.
    pub repos_already_indexed: usize,
    /// Blank READMEs skipped at chunking time.
    pub empty_readmes: usize,
}
