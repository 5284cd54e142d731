//! Bounded-parallelism README fetch.
//!
//! For every snapshot row whose README file is missing, a fetch task runs
//! on a bounded worker pool. One repository's failure never aborts the
//! batch: `NotFound` and exhausted transient failures are logged, counted,
//! and skipped. A repository whose file already exists is skipped without
//! a remote call, so re-running against an unchanged snapshot costs zero
//! network traffic.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::github::StarSource;
use crate::models::{FetchReport, RepoRecord};

/// README cache file for one repository id.
pub fn readme_path(readme_dir: &Path, repo_id: i64) -> PathBuf {
    readme_dir.join(format!("{}.md", repo_id))
}

/// Cached README text for one repository id, if a fetch ever succeeded.
pub fn read_cached(readme_dir: &Path, repo_id: i64) -> Result<Option<String>> {
    let path = readme_path(readme_dir, repo_id);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read cached README: {}", path.display()))?;
    Ok(Some(text))
}

enum TaskOutcome {
    Fetched,
    NotFound,
    Failed,
}

/// Fetch every missing README for `repos`, at most `parallelism` in flight.
///
/// Returns only when every submitted task has terminated; completion order
/// is unspecified.
pub async fn fetch_missing(
    source: Arc<dyn StarSource>,
    readme_dir: &Path,
    repos: &[RepoRecord],
    parallelism: usize,
) -> Result<FetchReport> {
    std::fs::create_dir_all(readme_dir)
        .with_context(|| format!("Failed to create directory: {}", readme_dir.display()))?;

    let mut report = FetchReport::default();
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

    for repo in repos {
        let path = readme_path(readme_dir, repo.id);
        if path.exists() {
            report.skipped += 1;
            continue;
        }

        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        let full_name = repo.full_name.clone();

        tasks.spawn(async move {
            // Closed only on runtime shutdown
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return TaskOutcome::Failed,
            };

            match source.fetch_readme(&full_name).await {
                Ok(bytes) => {
                    if let Err(e) = tokio::fs::write(&path, &bytes).await {
                        warn!(repo = %full_name, error = %e, "failed to write README file");
                        return TaskOutcome::Failed;
                    }
                    debug!(repo = %full_name, bytes = bytes.len(), "fetched README");
                    TaskOutcome::Fetched
                }
                Err(FetchError::NotFound) => {
                    warn!(repo = %full_name, "repository has no README, skipping");
                    TaskOutcome::NotFound
                }
                Err(e) => {
                    warn!(repo = %full_name, error = %e, "failed to fetch README, skipping");
                    TaskOutcome::Failed
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined.context("README fetch task panicked")? {
            TaskOutcome::Fetched => report.fetched += 1,
            TaskOutcome::NotFound => report.not_found += 1,
            TaskOutcome::Failed => report.failed += 1,
        }
    }

    Ok(report)
}
