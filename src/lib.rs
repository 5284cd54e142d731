//! # stardex
//!
//! A local, searchable knowledge base over your starred GitHub
//! repositories, for retrieval-augmented question answering.
//!
//! stardex keeps a durable snapshot of the authenticated user's starred
//! repositories, caches their READMEs on disk, embeds description and
//! README chunks through a content-addressed embedding cache, and answers
//! similarity queries from a persistent vector index. Answer generation is
//! deliberately out of scope: the query path returns ranked context for an
//! external language-model collaborator.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │  GitHub    │──▶│ Snapshot   │──▶│ README cache │──▶│ Chunk + Embed │
//! │ connector  │   │ (SQLite)   │   │ (one file/id)│   │ (cached)      │
//! └───────────┘   └───────────┘   └──────────────┘   └──────┬───────┘
//!                                                           ▼
//!                                                    ┌──────────────┐
//!                                  ask ────────────▶ │ Vector index │
//!                                                    │   (SQLite)   │
//!                                                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! stardex build                    # sync stars, fetch READMEs, index
//! stardex ask "http client crate"  # retrieve supporting context
//! stardex get-readme owner/repo    # print a cached README
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`github`] | GitHub source connector |
//! | [`snapshot`] | Starred-repository snapshot store and reconciler |
//! | [`readme`] | Bounded-parallelism README fetch |
//! | [`chunk`] | Deterministic text chunking |
//! | [`embedder`] | Embedding provider abstraction |
//! | [`cache`] | Content-addressed embedding cache |
//! | [`index`] | Durable vector index and similarity search |
//! | [`pipeline`] | Build and query orchestration |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedder;
pub mod error;
pub mod github;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod readme;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testutil;
