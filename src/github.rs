//! GitHub source connector.
//!
//! Fetches the authenticated user's starred-repository list and raw README
//! content from the GitHub REST API. This is the only module that talks to
//! GitHub; everything downstream consumes [`StarSource`].
//!
//! # Retry Strategy
//!
//! Transient errors use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::RepoRecord;

const API_ROOT: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("stardex/", env!("CARGO_PKG_VERSION"));

/// Repositories per starred-list page. GitHub's maximum.
pub const PER_PAGE: usize = 100;

/// The authenticated user, as far as the snapshot cares.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: i64,
    pub login: String,
}

/// Capability seam over the remote platform.
///
/// `total_starred` is the snapshot's sole staleness oracle and must be
/// fetched before any page is drained. The paged listing is single-pass:
/// each page costs one remote call and pages are not revisited.
#[async_trait]
pub trait StarSource: Send + Sync {
    async fn viewer(&self) -> Result<Viewer>;

    /// Authoritative count of starred repositories.
    async fn total_starred(&self) -> Result<u64>;

    /// One page of the starred list, 1-based. A short or empty page marks
    /// the end of the stream.
    async fn starred_page(&self, page: u32) -> Result<Vec<RepoRecord>>;

    /// Raw README bytes for `owner/repo`.
    async fn fetch_readme(&self, full_name: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`StarSource`] backed by the GitHub REST API.
pub struct GithubConnector {
    client: reqwest::Client,
    token: String,
    max_retries: u32,
}

impl GithubConnector {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token: config.github_pat.clone(),
            max_retries: config.fetch.max_retries,
        })
    }

    /// GET with retry/backoff. 404 maps to [`FetchError::NotFound`]; other
    /// non-retryable client errors and exhausted retries map to
    /// [`FetchError::Transient`].
    async fn get(&self, url: &str, accept: &str) -> Result<reqwest::Response, FetchError> {
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .get(url)
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Accept", accept)
                .header("X-GitHub-Api-Version", API_VERSION)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 404 {
                        return Err(FetchError::NotFound);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        last_err = Some(FetchError::Transient(format!(
                            "GitHub API error {}: {}",
                            status, body
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body = response.text().await.unwrap_or_default();
                    return Err(FetchError::Transient(format!(
                        "GitHub API error {}: {}",
                        status, body
                    )));
                }
                Err(e) => {
                    last_err = Some(FetchError::Transient(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| FetchError::Transient("request failed after retries".into())))
    }

    /// GET returning JSON, for endpoints where any failure is fatal
    /// (listing is not partitionable).
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self
            .get(url, "application/vnd.github+json")
            .await
            .map_err(|e| anyhow!("{}: {}", url, e))?;
        response.json().await.with_context(|| format!("Invalid JSON from {}", url))
    }
}

#[async_trait]
impl StarSource for GithubConnector {
    async fn viewer(&self) -> Result<Viewer> {
        let json = self.get_json(&format!("{}/user", API_ROOT)).await?;
        let id = json
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| anyhow!("GET /user: missing user id"))?;
        let login = json
            .get("login")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        Ok(Viewer { id, login })
    }

    async fn total_starred(&self) -> Result<u64> {
        // With per_page=1, the page number of rel="last" equals the total
        // item count. No Link header means zero or one star.
        let url = format!("{}/user/starred?per_page=1", API_ROOT);
        let response = self
            .get(&url, "application/vnd.github+json")
            .await
            .map_err(|e| anyhow!("{}: {}", url, e))?;

        let link = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(total) = link.as_deref().and_then(last_page_from_link) {
            return Ok(total);
        }

        let items: Vec<serde_json::Value> = response
            .json()
            .await
            .context("Invalid JSON from starred listing")?;
        Ok(items.len() as u64)
    }

    async fn starred_page(&self, page: u32) -> Result<Vec<RepoRecord>> {
        let url = format!(
            "{}/user/starred?per_page={}&page={}",
            API_ROOT, PER_PAGE, page
        );
        let json = self.get_json(&url).await?;
        let items = json
            .as_array()
            .ok_or_else(|| anyhow!("Invalid starred listing: expected array"))?;

        items.iter().map(parse_repo).collect()
    }

    async fn fetch_readme(&self, full_name: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/repos/{}/readme", API_ROOT, full_name);
        let response = self.get(&url, "application/vnd.github.raw+json").await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Map one repository object from the starred listing to a [`RepoRecord`].
fn parse_repo(item: &serde_json::Value) -> Result<RepoRecord> {
    let id = item
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Invalid repository object: missing id"))?;
    let full_name = item
        .get("full_name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Invalid repository object: missing full_name"))?
        .to_string();
    let description = item
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let created_at = item
        .get("created_at")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let topics = item
        .get("topics")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(RepoRecord {
        id,
        full_name,
        description,
        created_at,
        topics,
    })
}

/// Extract the page number of `rel="last"` from a `Link` header.
fn last_page_from_link(link: &str) -> Option<u64> {
    for part in link.split(',') {
        let part = part.trim();
        if !part.ends_with("rel=\"last\"") {
            continue;
        }
        let url = part.strip_prefix('<')?.split('>').next()?;
        for pair in url.split('?').nth(1)?.split('&') {
            if let Some(value) = pair.strip_prefix("page=") {
                return value.parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_parses_total() {
        let link = "<https://api.github.com/user/starred?per_page=1&page=2>; rel=\"next\", \
                    <https://api.github.com/user/starred?per_page=1&page=173>; rel=\"last\"";
        assert_eq!(last_page_from_link(link), Some(173));
    }

    #[test]
    fn last_page_absent() {
        let link = "<https://api.github.com/user/starred?per_page=1&page=2>; rel=\"next\"";
        assert_eq!(last_page_from_link(link), None);
        assert_eq!(last_page_from_link(""), None);
    }

    #[test]
    fn parse_repo_maps_fields() {
        let item = serde_json::json!({
            "id": 42,
            "full_name": "octo/widget",
            "description": "A widget",
            "created_at": "2021-03-04T05:06:07Z",
            "topics": ["cli", "rust"],
        });
        let record = parse_repo(&item).unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.full_name, "octo/widget");
        assert_eq!(record.description.as_deref(), Some("A widget"));
        assert_eq!(record.topics, vec!["cli", "rust"]);
    }

    #[test]
    fn parse_repo_tolerates_nulls() {
        let item = serde_json::json!({
            "id": 7,
            "full_name": "octo/bare",
            "description": null,
        });
        let record = parse_repo(&item).unwrap();
        assert_eq!(record.description, None);
        assert!(record.topics.is_empty());
    }
}
