// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local pending-write queue for pizza creations made while offline.
//!
//! Payloads that could not reach the server are appended to a local SQLite
//! file under an auto-incrementing sequence number. The sync agent reads a
//! snapshot, uploads it as one batch, and on success removes everything up to
//! the last sequence it sent. Entries appended after the snapshot have larger
//! sequence numbers and survive the removal.
//!
//! This is NOT a cache of server state. Entries are "in flight" to the server
//! and are never read back by anything except the sync agent.
//!
//! ```sql
//! CREATE TABLE pending_writes (
//!   seq       INTEGER PRIMARY KEY AUTOINCREMENT, -- never reused
//!   payload   TEXT NOT NULL,                     -- serialized NewPizza
//!   queued_at INTEGER NOT NULL                   -- epoch millis
//! )
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::NewPizza;
use crate::storage::sql::{install_drivers, text_column};

#[derive(Error, Debug)]
pub enum QueueError {
    /// The queue file could not be opened. Fatal for the session.
    #[error("failed to open pending-write queue at {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("pending-write queue full: {pending} items (max {max})")]
    Full { pending: u64, max: u64 },
    #[error("pending-write queue storage error: {0}")]
    Storage(String),
    #[error("pending write #{seq} is unreadable: {reason}")]
    Corrupt { seq: u64, reason: String },
    #[error("payload could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn storage(e: sqlx::Error) -> QueueError {
    QueueError::Storage(e.to_string())
}

/// One queued creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub seq: u64,
    pub payload: NewPizza,
    pub queued_at: DateTime<Utc>,
}

/// Queue counters for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Entries currently waiting
    pub pending: u64,
    /// Entries enqueued since open
    pub total_enqueued: u64,
    /// Entries removed after a successful sync since open
    pub total_synced: u64,
}

/// Durable FIFO of pizza-creation payloads backed by SQLite.
pub struct PendingQueue {
    pool: AnyPool,
    path: String,
    pending: AtomicU64,
    total_enqueued: AtomicU64,
    total_synced: AtomicU64,
    max_items: u64,
}

impl PendingQueue {
    /// Open (or create) the queue file.
    ///
    /// No retry: if local storage is unusable every queue operation for this
    /// session would fail anyway, so the error goes straight to the caller.
    pub async fn open(path: impl AsRef<Path>, max_items: u64) -> Result<Self, QueueError> {
        install_drivers();

        let path_str = path.as_ref().to_string_lossy().to_string();
        let open_err = |e: sqlx::Error| QueueError::Open {
            path: path_str.clone(),
            reason: e.to_string(),
        };

        info!(path = %path_str, max_items, "Opening pending-write queue");

        // One connection: SQLite has a single writer anyway, and it keeps
        // snapshot/remove ordering trivially serial.
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&format!("sqlite://{}?mode=rwc", path_str))
            .await
            .map_err(open_err)?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .map_err(open_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_writes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                queued_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(open_err)?;

        let queue = Self {
            pool,
            path: path_str,
            pending: AtomicU64::new(0),
            total_enqueued: AtomicU64::new(0),
            total_synced: AtomicU64::new(0),
            max_items,
        };

        let pending = queue.len().await?;
        queue.pending.store(pending, Ordering::Release);
        if pending > 0 {
            warn!(pending, "Pending-write queue has entries from a previous session");
        }
        crate::metrics::set_queue_depth(pending);

        Ok(queue)
    }

    /// Append a payload. Local only, no network.
    ///
    /// The size check and the insert are one statement, so concurrent
    /// callers cannot push the queue past `max_items`.
    pub async fn enqueue(&self, payload: &NewPizza) -> Result<u64, QueueError> {
        let body = serde_json::to_string(payload)?;
        let row = sqlx::query(
            r#"
            INSERT INTO pending_writes (payload, queued_at)
            SELECT ?, ?
            WHERE (SELECT COUNT(*) FROM pending_writes) < ?
            RETURNING seq
            "#,
        )
        .bind(body)
        .bind(Utc::now().timestamp_millis())
        .bind(self.max_items.min(i64::MAX as u64) as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            let pending = self.len().await?;
            self.pending.store(pending, Ordering::Release);
            return Err(QueueError::Full {
                pending,
                max: self.max_items,
            });
        };
        let seq: i64 = row.try_get("seq").map_err(storage)?;
        let seq = seq as u64;

        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_enqueue();
        crate::metrics::set_queue_depth(pending);

        debug!(seq, pending, pizza = %payload.pizza_name, "Pizza queued for later sync");
        Ok(seq)
    }

    /// Every queued entry in insertion order. Read-only.
    pub async fn snapshot(&self) -> Result<Vec<PendingWrite>, QueueError> {
        let rows = sqlx::query("SELECT seq, payload, queued_at FROM pending_writes ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let seq: i64 = row.try_get("seq").map_err(storage)?;
                let seq = seq as u64;
                let payload = text_column(row, "payload")
                    .map_err(|e| QueueError::Corrupt { seq, reason: e.to_string() })?;
                let payload: NewPizza = serde_json::from_str(&payload)
                    .map_err(|e| QueueError::Corrupt { seq, reason: e.to_string() })?;
                let queued_at: i64 = row.try_get("queued_at").map_err(storage)?;
                Ok(PendingWrite {
                    seq,
                    payload,
                    queued_at: Utc
                        .timestamp_millis_opt(queued_at)
                        .single()
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Remove every entry with `seq <= last_seq`. Returns how many went.
    pub async fn remove_through(&self, last_seq: u64) -> Result<u64, QueueError> {
        let result = sqlx::query("DELETE FROM pending_writes WHERE seq <= ?")
            .bind(last_seq as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        let removed = result.rows_affected();

        let pending = self.len().await?;
        self.pending.store(pending, Ordering::Release);
        self.total_synced.fetch_add(removed, Ordering::Relaxed);
        crate::metrics::set_queue_depth(pending);

        if pending == 0 {
            if let Err(e) = self.checkpoint().await {
                warn!(error = %e, "Failed to checkpoint queue after clearing");
            }
        }

        debug!(removed, remaining = pending, "Synced entries removed from queue");
        Ok(removed)
    }

    /// Number of entries currently stored.
    pub async fn len(&self) -> Result<u64, QueueError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM pending_writes")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        let count: i64 = row.try_get("cnt").map_err(storage)?;
        Ok(count as u64)
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending.load(Ordering::Acquire),
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            total_synced: self.total_synced.load(Ordering::Relaxed),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fold the SQLite WAL back into the main file once the queue is empty.
    async fn checkpoint(&self) -> Result<(), QueueError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
