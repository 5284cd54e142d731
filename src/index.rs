//! Durable vector index over chunk embeddings.
//!
//! Persists chunk text, embedding, and repository metadata to SQLite and
//! answers similarity queries by brute-force cosine scan, descending by
//! similarity with a deterministic tie-break. The table is append-only:
//! there is no update or delete, so callers de-duplicate before `add`
//! (the pipeline skips repositories already present, via
//! [`VectorIndex::indexed_repo_ids`]).

use anyhow::{bail, Context, Result};
use sqlx::sqlite::SqliteJournalMode;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;

use crate::db;
use crate::embedder::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ContextHit, RepoRecord, TextChunk};

pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::open(path, SqliteJournalMode::Wal)
            .await
            .context("Failed to open vector index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo_id INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_repo_id ON vectors(repo_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Append chunks with their vectors and owning-repository metadata.
    /// The three slices are parallel and must be the same length.
    pub async fn add(
        &self,
        chunks: &[TextChunk],
        vectors: &[Vec<f32>],
        metadatas: &[RepoRecord],
    ) -> Result<()> {
        if chunks.len() != vectors.len() || chunks.len() != metadatas.len() {
            bail!(
                "add: mismatched lengths (chunks {}, vectors {}, metadatas {})",
                chunks.len(),
                vectors.len(),
                metadatas.len()
            );
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for ((chunk, vector), metadata) in chunks.iter().zip(vectors).zip(metadatas) {
            sqlx::query(
                r#"
                INSERT INTO vectors (repo_id, chunk_index, kind, text, embedding, metadata, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk.repo_id)
            .bind(chunk.chunk_index)
            .bind(chunk.kind.as_str())
            .bind(&chunk.text)
            .bind(vec_to_blob(vector))
            .bind(serde_json::to_string(metadata)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Repositories with at least one indexed chunk.
    pub async fn indexed_repo_ids(&self) -> Result<HashSet<i64>> {
        let rows: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT repo_id FROM vectors")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Number of stored vectors for one repository.
    pub async fn count_for_repo(&self, repo_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE repo_id = ?")
            .bind(repo_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Top-`k` chunks by cosine similarity against `query`, descending.
    /// Ties break on insertion order (row id) so results are deterministic.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ContextHit>> {
        let rows = sqlx::query("SELECT id, text, embedding, metadata FROM vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(i64, f32, String, String)> = rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(query, &blob_to_vec(&blob));
                let text: String = row.get("text");
                let metadata: String = row.get("metadata");
                (id, score, text, metadata)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(_, score, text, metadata)| {
                let repo: RepoRecord = serde_json::from_str(&metadata)
                    .context("Corrupt metadata column in vector index")?;
                Ok(ContextHit { text, score, repo })
            })
            .collect()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
