//! Snapshot store and reconciler.
//!
//! The snapshot is the durable table of one user's starred-repository
//! metadata, one SQLite file per user id. Freshness has a single oracle:
//! the stored row count versus the total the remote reports. Any drift
//! discards the table and rebuilds it from a full drain of the starred
//! list — there is no incremental diff.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteJournalMode;
use sqlx::Row;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db;
use crate::github::{StarSource, PER_PAGE};
use crate::models::RepoRecord;

/// Reconciler states. `Refetching` is transient; every build invocation
/// terminates `Fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Fresh,
    Stale,
    Refetching,
}

/// One user's snapshot file.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Path is derived from the user id: `<dir>/<user_id>-starred.sqlite`.
    pub fn for_user(snapshot_dir: &Path, user_id: i64) -> Self {
        Self::at(snapshot_dir.join(format!("{}-starred.sqlite", user_id)))
    }

    /// Open an existing snapshot file directly (offline lookups).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot, or `None` if it was never written.
    pub async fn load(&self) -> Result<Option<Vec<RepoRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let pool = db::open(&self.path, SqliteJournalMode::Delete).await?;
        let rows = sqlx::query(
            "SELECT id, full_name, description, created_at, topics FROM repositories ORDER BY rowid",
        )
        .fetch_all(&pool)
        .await?;
        pool.close().await;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let topics_json: String = row.get("topics");
            let topics: Vec<String> = serde_json::from_str(&topics_json)
                .with_context(|| "Corrupt topics column in snapshot")?;
            records.push(RepoRecord {
                id: row.get("id"),
                full_name: row.get("full_name"),
                description: row.get("description"),
                created_at: row.get("created_at"),
                topics,
            });
        }

        Ok(Some(records))
    }

    /// Atomically replace the snapshot with `records`.
    ///
    /// Writes a sibling `.tmp` file and renames it over the target, so a
    /// concurrent reader never observes a partially written table.
    pub async fn replace(&self, records: &[RepoRecord]) -> Result<()> {
        let tmp_path = self.path.with_extension("sqlite.tmp");
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path)?;
        }

        let pool = db::open(&tmp_path, SqliteJournalMode::Delete).await?;

        sqlx::query(
            r#"
            CREATE TABLE repositories (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                topics TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let mut tx = pool.begin().await?;
        for record in records {
            let topics_json = serde_json::to_string(&record.topics)?;
            sqlx::query(
                "INSERT INTO repositories (id, full_name, description, created_at, topics) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.id)
            .bind(&record.full_name)
            .bind(&record.description)
            .bind(&record.created_at)
            .bind(topics_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        pool.close().await;

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace snapshot: {}", self.path.display()))?;
        Ok(())
    }
}

/// Reconcile the stored snapshot against the remote starred list.
///
/// Returns the current records and whether a refetch happened. The state
/// walk is `Fresh` (counts match) or `Stale -> Refetching -> Fresh`.
pub async fn reconcile(
    store: &SnapshotStore,
    source: &dyn StarSource,
) -> Result<(Vec<RepoRecord>, bool)> {
    let total = source.total_starred().await?;
    let existing = store.load().await?;

    let state = match &existing {
        Some(rows) if rows.len() as u64 == total => SnapshotState::Fresh,
        _ => SnapshotState::Stale,
    };

    if state == SnapshotState::Fresh {
        let rows = existing.unwrap_or_default();
        debug!(rows = rows.len(), "snapshot fresh");
        return Ok((rows, false));
    }

    info!(
        stored = existing.as_ref().map(Vec::len).unwrap_or(0),
        remote = total,
        "snapshot stale, refetching starred repositories"
    );

    // Refetching: drain every page, then replace the table in one shot.
    let mut records: Vec<RepoRecord> = Vec::with_capacity(total as usize);
    let mut page: u32 = 1;
    loop {
        let batch = source.starred_page(page).await?;
        let done = batch.len() < PER_PAGE;
        records.extend(batch);
        if done {
            break;
        }
        page += 1;
    }

    store.replace(&records).await?;
    info!(rows = records.len(), "snapshot replaced");
    Ok((records, true))
}
