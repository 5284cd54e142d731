//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and one concrete implementation
//! per supported provider:
//! - **[`OpenAiProvider`]** — `POST /v1/embeddings` against the OpenAI API.
//! - **[`AzureOpenAiProvider`]** — the same API shape behind an Azure
//!   deployment endpoint and `api-key` header.
//! - **[`OllamaProvider`]** — `POST /api/embed` against a local Ollama.
//!
//! Provider selection is by [`ProviderKind`]; an unsupported identity is
//! rejected at configuration time, never at call time. All providers use
//! the same retry strategy for transient errors: HTTP 429/5xx and network
//! errors retry with exponential backoff (1s, 2s, 4s, ... capped at 2^5),
//! other 4xx fail immediately.
//!
//! Also provides vector utilities shared by the cache and the index:
//! [`vec_to_blob`], [`blob_to_vec`], and [`cosine_similarity`].

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{EmbedderConfig, ProviderKind};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Capability over an external embedding service: texts in, vectors out,
/// order and length preserved.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier; doubles as the embedding-cache namespace.
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Instantiate the provider named by the configuration.
///
/// The config's provider string was validated at load time; constructors
/// still check their own required fields so a hand-built [`EmbedderConfig`]
/// fails fast too.
pub fn create_provider(
    kind: ProviderKind,
    config: &EmbedderConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match kind {
        ProviderKind::OpenAi => Ok(Box::new(OpenAiProvider::new(config)?)),
        ProviderKind::AzureOpenAi => Ok(Box::new(AzureOpenAiProvider::new(config)?)),
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(config)?)),
    }
}

fn http_client(config: &EmbedderConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// POST `body` to `url` with retry/backoff, returning the response JSON.
/// `headers` are (name, value) pairs applied to every attempt.
async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("embedding API error {}: {}", status, body_text));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("embedding failed after retries")))
}

/// Parse an OpenAI-shaped embeddings response: `data[].embedding`.
fn parse_openai_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data array"))?;

    if data.len() != expected {
        bail!(
            "Invalid embeddings response: expected {} vectors, got {}",
            expected,
            data.len()
        );
    }

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid embeddings response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ OpenAI ============

pub struct OpenAiProvider {
    client: reqwest::Client,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                anyhow!("embedder.api_key (or OPENAI_API_KEY) required for provider 'openai'")
            })?;

        Ok(Self {
            client: http_client(config)?,
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let headers = [("Authorization", format!("Bearer {}", self.api_key))];
        let json =
            post_with_retry(&self.client, OPENAI_EMBEDDINGS_URL, &headers, &body, self.max_retries)
                .await?;
        parse_openai_response(&json, texts.len())
    }
}

// ============ Azure OpenAI ============

pub struct AzureOpenAiProvider {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl AzureOpenAiProvider {
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let endpoint = config
            .api_endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("embedder.api_endpoint required for provider 'azure_openai'"))?
            .trim_end_matches('/');
        let deployment = config
            .api_deployment
            .as_deref()
            .ok_or_else(|| anyhow!("embedder.api_deployment required for provider 'azure_openai'"))?;
        let api_version = config
            .api_version
            .as_deref()
            .ok_or_else(|| anyhow!("embedder.api_version required for provider 'azure_openai'"))?;
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("AZURE_OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                anyhow!("embedder.api_key (or AZURE_OPENAI_API_KEY) required for provider 'azure_openai'")
            })?;

        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            endpoint, deployment, api_version
        );

        Ok(Self {
            client: http_client(config)?,
            model: config.model.clone(),
            url,
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "input": texts });
        let headers = [("api-key", self.api_key.clone())];
        let json =
            post_with_retry(&self.client, &self.url, &headers, &body, self.max_retries).await?;
        parse_openai_response(&json, texts.len())
    }
}

// ============ Ollama ============

pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let endpoint = config
            .api_endpoint
            .as_deref()
            .unwrap_or(OLLAMA_DEFAULT_ENDPOINT)
            .trim_end_matches('/');

        Ok(Self {
            client: http_client(config)?,
            model: config.model.clone(),
            url: format!("{}/api/embed", endpoint),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = post_with_retry(&self.client, &self.url, &[], &body, self.max_retries).await?;

        let data = json
            .get("embeddings")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

        if data.len() != texts.len() {
            bail!(
                "Invalid Ollama response: expected {} vectors, got {}",
                texts.len(),
                data.len()
            );
        }

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let embedding = item
                .as_array()
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))?;
            embeddings.push(
                embedding
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect(),
            );
        }

        Ok(embeddings)
    }
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched
/// vectors. Applied identically at index time and query time.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedderConfig;

    fn base_config() -> EmbedderConfig {
        EmbedderConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: Some("sk-test".to_string()),
            api_version: None,
            api_endpoint: None,
            api_deployment: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }

    #[test]
    fn blob_round_trip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn cosine_basics() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn azure_requires_endpoint_fields() {
        let mut config = base_config();
        config.provider = "azure_openai".to_string();
        assert!(AzureOpenAiProvider::new(&config).is_err());

        config.api_endpoint = Some("https://example.openai.azure.com".to_string());
        config.api_deployment = Some("embed".to_string());
        config.api_version = Some("2024-02-01".to_string());
        let provider = AzureOpenAiProvider::new(&config).unwrap();
        assert_eq!(
            provider.url,
            "https://example.openai.azure.com/openai/deployments/embed/embeddings?api-version=2024-02-01"
        );
    }

    #[test]
    fn ollama_defaults_to_localhost() {
        let mut config = base_config();
        config.provider = "ollama".to_string();
        config.api_key = None;
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.url, "http://localhost:11434/api/embed");
    }

    #[test]
    fn parse_openai_shape() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2] },
                { "embedding": [0.3, 0.4] },
            ]
        });
        let vectors = parse_openai_response(&json, 2).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3f32, 0.4]);
        assert!(parse_openai_response(&json, 3).is_err());
    }
}
