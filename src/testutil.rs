//! Shared test doubles: an in-memory [`StarSource`] with call counters and
//! a deterministic embedding provider that needs no network.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::embedder::EmbeddingProvider;
use crate::error::FetchError;
use crate::github::{StarSource, Viewer, PER_PAGE};
use crate::models::RepoRecord;

#[derive(Default)]
pub struct SourceCounters {
    total: AtomicUsize,
    pages: AtomicUsize,
    readmes: AtomicUsize,
}

impl SourceCounters {
    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
    pub fn page_calls(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }
    pub fn readme_calls(&self) -> usize {
        self.readmes.load(Ordering::SeqCst)
    }
}

enum ReadmeBehavior {
    Text(String),
    Transient,
}

/// In-memory remote: a fixed starred list, README text per full_name
/// (absent = NotFound), and per-endpoint call counters.
pub struct FakeSource {
    repos: Vec<RepoRecord>,
    readmes: HashMap<String, ReadmeBehavior>,
    counters: Arc<SourceCounters>,
}

impl FakeSource {
    pub fn new(repos: Vec<RepoRecord>) -> Self {
        Self {
            repos,
            readmes: HashMap::new(),
            counters: Arc::new(SourceCounters::default()),
        }
    }

    pub fn with_readme(mut self, full_name: &str, text: &str) -> Self {
        self.readmes
            .insert(full_name.to_string(), ReadmeBehavior::Text(text.to_string()));
        self
    }

    /// Every fetch for this repository fails with a transient error.
    pub fn with_transient_readme(mut self, full_name: &str) -> Self {
        self.readmes
            .insert(full_name.to_string(), ReadmeBehavior::Transient);
        self
    }

    pub fn clone_counters(&self) -> Arc<SourceCounters> {
        Arc::clone(&self.counters)
    }

    pub fn page_calls(&self) -> usize {
        self.counters.page_calls()
    }

    pub fn readme_calls(&self) -> usize {
        self.counters.readme_calls()
    }
}

#[async_trait]
impl StarSource for FakeSource {
    async fn viewer(&self) -> Result<Viewer> {
        Ok(Viewer {
            id: 1000,
            login: "tester".to_string(),
        })
    }

    async fn total_starred(&self) -> Result<u64> {
        self.counters.total.fetch_add(1, Ordering::SeqCst);
        Ok(self.repos.len() as u64)
    }

    async fn starred_page(&self, page: u32) -> Result<Vec<RepoRecord>> {
        self.counters.pages.fetch_add(1, Ordering::SeqCst);
        let start = (page as usize - 1) * PER_PAGE;
        Ok(self
            .repos
            .iter()
            .skip(start)
            .take(PER_PAGE)
            .cloned()
            .collect())
    }

    async fn fetch_readme(&self, full_name: &str) -> Result<Vec<u8>, FetchError> {
        self.counters.readmes.fetch_add(1, Ordering::SeqCst);
        match self.readmes.get(full_name) {
            Some(ReadmeBehavior::Text(text)) => Ok(text.as_bytes().to_vec()),
            Some(ReadmeBehavior::Transient) => {
                Err(FetchError::Transient("connection reset".to_string()))
            }
            None => Err(FetchError::NotFound),
        }
    }
}

#[derive(Clone)]
pub struct ProviderCounter(Arc<AtomicUsize>);

impl ProviderCounter {
    /// Total texts the underlying provider was asked to embed.
    pub fn texts_embedded(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deterministic bag-of-words embedder: words hash into a fixed number of
/// buckets and the vector is L2-normalized, so texts sharing words land
/// close under cosine similarity. Good enough to test ranking end to end.
pub struct MockProvider {
    model: String,
    counter: Arc<AtomicUsize>,
}

pub const MOCK_DIMS: usize = 32;

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn clone_counter(&self) -> ProviderCounter {
        ProviderCounter(Arc::clone(&self.counter))
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; MOCK_DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % MOCK_DIMS;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.counter.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}
