use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Supported embedding providers. Anything else fails configuration
/// validation before any data is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    AzureOpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openai" => Some(ProviderKind::OpenAi),
            "azure_openai" => Some(ProviderKind::AzureOpenAi),
            "ollama" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::AzureOpenAi => "azure_openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// GitHub personal access token. Supplied, assumed valid.
    pub github_pat: String,
    #[serde(default)]
    pub storage: StorageConfig,
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for the snapshot, README cache, embedding cache,
    /// and vector index. Each lives in its own subdirectory.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbedderConfig {
    /// One of `openai`, `azure_openai`, `ollama`.
    pub provider: String,
    /// Model identifier, also the cache namespace (e.g. `text-embedding-3-small`).
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub api_deployment: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Worker-pool size for README fetches.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_parallelism() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    8
}

impl Config {
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        ProviderKind::parse(&self.embedder.provider).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown embedding provider: '{}'. Must be openai, azure_openai, or ollama.",
                self.embedder.provider
            )
        })
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.storage.data_dir.join("snapshots")
    }

    pub fn readme_dir(&self) -> PathBuf {
        self.storage.data_dir.join("readmes")
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.storage.data_dir.join("cache").join("embeddings.sqlite")
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.storage.data_dir.join("index").join("vectors.sqlite")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.github_pat.trim().is_empty() {
        anyhow::bail!("github_pat must be set");
    }

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate fetch
    if config.fetch.parallelism == 0 {
        anyhow::bail!("fetch.parallelism must be >= 1");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedder
    if config.embedder.model.trim().is_empty() {
        anyhow::bail!("embedder.model must be set");
    }

    let kind = match ProviderKind::parse(&config.embedder.provider) {
        Some(kind) => kind,
        None => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, azure_openai, or ollama.",
            config.embedder.provider
        ),
    };

    if kind == ProviderKind::AzureOpenAi {
        for (field, value) in [
            ("api_endpoint", &config.embedder.api_endpoint),
            ("api_deployment", &config.embedder.api_deployment),
            ("api_version", &config.embedder.api_version),
        ] {
            if value.is_none() {
                anyhow::bail!("embedder.{} is required for provider 'azure_openai'", field);
            }
        }
    }

    Ok(config)
}
