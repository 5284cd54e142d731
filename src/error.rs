//! Per-item fetch error taxonomy.
//!
//! README retrieval is the one place where failures must stay local to the
//! item: a missing README is expected, a network hiccup is retried and then
//! skipped. Both are collected into a [`crate::models::FetchReport`] instead
//! of aborting the batch.

use thiserror::Error;

/// Why a single README could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The repository has no README (HTTP 404). Expected, non-fatal.
    #[error("no README")]
    NotFound,

    /// A network, rate-limit, or server error that survived retries.
    #[error("transient failure: {0}")]
    Transient(String),
}
