//! Content-addressed embedding cache.
//!
//! A durable key-value store mapping `(namespace, content_hash)` to a
//! previously computed vector, where the namespace is the embedding model
//! identity and the hash is SHA-256 of the exact text. Identical text under
//! the same model never recomputes: the cache guarantees at most one
//! externally-billed provider call per unique (model, text) pair for the
//! lifetime of the store, across process restarts. Entries are immutable
//! once written.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteJournalMode;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::db;
use crate::embedder::{blob_to_vec, vec_to_blob, EmbeddingProvider};

/// SHA-256 hex digest of `text`, the cache key.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The backing store, namespaced by model identity.
pub struct EmbeddingCache {
    pool: SqlitePool,
    namespace: String,
}

impl EmbeddingCache {
    pub async fn open(path: &Path, namespace: &str) -> Result<Self> {
        let pool = db::open(path, SqliteJournalMode::Wal).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                namespace TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                vector BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, content_hash)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            namespace: namespace.to_string(),
        })
    }

    pub async fn get(&self, content_hash: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT vector FROM embeddings WHERE namespace = ? AND content_hash = ?",
        )
        .bind(&self.namespace)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    /// Idempotent insert: the first write for a key wins, later identical
    /// writes are ignored.
    pub async fn put(&self, content_hash: &str, vector: &[f32]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT OR IGNORE INTO embeddings (namespace, content_hash, vector, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&self.namespace)
        .bind(content_hash)
        .bind(vec_to_blob(vector))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// An [`EmbeddingProvider`] memoized to disk.
///
/// `embed` preserves input order and length; texts repeated within one
/// batch are also collapsed to a single provider computation.
pub struct CachedEmbedder {
    cache: EmbeddingCache,
    provider: Box<dyn EmbeddingProvider>,
}

impl CachedEmbedder {
    pub async fn open(cache_path: &Path, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        let cache = EmbeddingCache::open(cache_path, provider.model_name()).await?;
        Ok(Self { cache, provider })
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| hash_text(t)).collect();

        // hash -> vector, filled from the cache first
        let mut resolved: HashMap<String, Vec<f32>> = HashMap::new();
        // unique misses, in first-seen order
        let mut miss_hashes: Vec<String> = Vec::new();
        let mut miss_texts: Vec<String> = Vec::new();

        for (text, hash) in texts.iter().zip(hashes.iter()) {
            if resolved.contains_key(hash) || miss_hashes.contains(hash) {
                continue;
            }
            match self.cache.get(hash).await? {
                Some(vector) => {
                    resolved.insert(hash.clone(), vector);
                }
                None => {
                    miss_hashes.push(hash.clone());
                    miss_texts.push(text.clone());
                }
            }
        }

        if !miss_texts.is_empty() {
            debug!(
                misses = miss_texts.len(),
                total = texts.len(),
                "computing embeddings for cache misses"
            );
            let vectors = self.provider.embed(&miss_texts).await?;
            if vectors.len() != miss_texts.len() {
                bail!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    miss_texts.len()
                );
            }
            for (hash, vector) in miss_hashes.iter().zip(vectors.into_iter()) {
                self.cache.put(hash, &vector).await?;
                resolved.insert(hash.clone(), vector);
            }
        }

        hashes
            .iter()
            .map(|hash| {
                resolved
                    .get(hash)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("missing embedding for hash {}", hash))
            })
            .collect()
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }
}
