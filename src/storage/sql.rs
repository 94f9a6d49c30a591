// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL document store (SQLite or MySQL through the sqlx `Any` driver).
//!
//! Documents are stored whole as JSON text, one row per document:
//! ```sql
//! CREATE TABLE pizzas (
//!   seq  INTEGER PRIMARY KEY AUTOINCREMENT, -- insertion order for listing
//!   id   TEXT NOT NULL UNIQUE,
//!   doc  TEXT NOT NULL                      -- Pizza, comment ids only
//! )
//! CREATE TABLE comments (
//!   id       TEXT PRIMARY KEY,
//!   pizza_id TEXT NOT NULL,
//!   doc      TEXT NOT NULL                  -- Comment with embedded replies
//! )
//! ```
//!
//! Every multi-document change (batch insert, comment push/pull, cascade
//! delete) runs in one transaction. On MySQL the read half of a
//! read-modify-write takes `FOR UPDATE`.
//!
//! ## sqlx Any driver quirks
//!
//! MySQL `LONGTEXT` comes back as bytes through the `Any` driver, so text
//! columns are read as `String` first and `Vec<u8>` second.

use std::collections::HashMap;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyConnection, AnyPool, Row};
use tracing::{debug, info};

use super::traits::{validate_batch, DocumentStore, StorageError};
use crate::model::{
    Comment, CommentView, NewComment, NewPizza, NewReply, Pizza, PizzaUpdate, PizzaView,
};
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

pub(crate) fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// Read a text column, tolerating drivers that hand TEXT back as bytes.
pub(crate) fn text_column(row: &AnyRow, column: &str) -> Result<String, StorageError> {
    row.try_get::<String, _>(column)
        .or_else(|_| {
            row.try_get::<Vec<u8>, _>(column)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        })
        .map_err(backend)
}

fn decode<T: DeserializeOwned>(id: &str, text: &str) -> Result<T, StorageError> {
    serde_json::from_str(text).map_err(|e| StorageError::Malformed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(id: &str, doc: &T) -> Result<String, StorageError> {
    serde_json::to_string(doc).map_err(|e| StorageError::Malformed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

pub struct SqlStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlStore {
    /// Connect with startup-mode retry, then create tables if missing.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::connect(), || async {
            AnyPoolOptions::new()
                .max_connections(if is_sqlite { 4 } else { 20 })
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(backend)
        })
        .await?;

        let store = Self { pool, is_sqlite };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        info!(sqlite = is_sqlite, "SQL document store ready");
        Ok(store)
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let statements: &[&str] = if self.is_sqlite {
            &[
                r#"
                CREATE TABLE IF NOT EXISTS pizzas (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    doc TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS comments (
                    id TEXT PRIMARY KEY,
                    pizza_id TEXT NOT NULL,
                    doc TEXT NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_comments_pizza ON comments (pizza_id)",
            ]
        } else {
            &[
                r#"
                CREATE TABLE IF NOT EXISTS pizzas (
                    seq BIGINT AUTO_INCREMENT PRIMARY KEY,
                    id VARCHAR(64) NOT NULL UNIQUE,
                    doc LONGTEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS comments (
                    id VARCHAR(64) PRIMARY KEY,
                    pizza_id VARCHAR(64) NOT NULL,
                    doc LONGTEXT NOT NULL,
                    INDEX idx_comments_pizza (pizza_id)
                )
                "#,
            ]
        };

        for sql in statements {
            retry("sql_init_schema", &RetryConfig::connect(), || async {
                sqlx::query(sql).execute(&self.pool).await.map_err(backend)
            })
            .await?;
        }
        Ok(())
    }

    /// Row lock for the read half of read-modify-write. SQLite locks the
    /// whole database on write, so it needs nothing here.
    fn for_update(&self) -> &'static str {
        if self.is_sqlite {
            ""
        } else {
            " FOR UPDATE"
        }
    }

    async fn fetch_pizza(
        &self,
        conn: &mut AnyConnection,
        id: &str,
        lock: bool,
    ) -> Result<Option<Pizza>, StorageError> {
        let sql = format!(
            "SELECT doc FROM pizzas WHERE id = ?{}",
            if lock { self.for_update() } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(backend)?;

        row.map(|r| decode(id, &text_column(&r, "doc")?)).transpose()
    }

    async fn fetch_comment(
        &self,
        conn: &mut AnyConnection,
        pizza_id: &str,
        comment_id: &str,
        lock: bool,
    ) -> Result<Option<Comment>, StorageError> {
        let sql = format!(
            "SELECT doc FROM comments WHERE id = ? AND pizza_id = ?{}",
            if lock { self.for_update() } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(comment_id)
            .bind(pizza_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(backend)?;

        row.map(|r| decode(comment_id, &text_column(&r, "doc")?))
            .transpose()
    }

    async fn fetch_comments_of(
        &self,
        conn: &mut AnyConnection,
        pizza_id: &str,
    ) -> Result<Vec<Comment>, StorageError> {
        let rows = sqlx::query("SELECT id, doc FROM comments WHERE pizza_id = ?")
            .bind(pizza_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|r| decode(&text_column(r, "id")?, &text_column(r, "doc")?))
            .collect()
    }

    async fn view(
        &self,
        conn: &mut AnyConnection,
        pizza: Pizza,
    ) -> Result<PizzaView, StorageError> {
        let comments = self.fetch_comments_of(conn, &pizza.id).await?;
        Ok(PizzaView::assemble(pizza, comments))
    }

    async fn write_pizza(&self, conn: &mut AnyConnection, pizza: &Pizza) -> Result<(), StorageError> {
        sqlx::query("UPDATE pizzas SET doc = ? WHERE id = ?")
            .bind(encode(&pizza.id, pizza)?)
            .bind(&pizza.id)
            .execute(&mut *conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn write_comment(
        &self,
        conn: &mut AnyConnection,
        comment: &Comment,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE comments SET doc = ? WHERE id = ?")
            .bind(encode(&comment.id, comment)?)
            .bind(&comment.id)
            .execute(&mut *conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqlStore {
    async fn list_pizzas(&self) -> Result<Vec<PizzaView>, StorageError> {
        let (pizza_rows, comment_rows) = retry("sql_list", &RetryConfig::query(), || async {
            let pizzas = sqlx::query("SELECT id, doc FROM pizzas ORDER BY seq")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
            let comments = sqlx::query("SELECT id, pizza_id, doc FROM comments")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
            Ok::<_, StorageError>((pizzas, comments))
        })
        .await?;

        let mut comments_by_pizza: HashMap<String, Vec<Comment>> = HashMap::new();
        for row in &comment_rows {
            let id = text_column(row, "id")?;
            let comment: Comment = decode(&id, &text_column(row, "doc")?)?;
            comments_by_pizza
                .entry(text_column(row, "pizza_id")?)
                .or_default()
                .push(comment);
        }

        pizza_rows
            .iter()
            .map(|row| -> Result<PizzaView, StorageError> {
                let id = text_column(row, "id")?;
                let pizza: Pizza = decode(&id, &text_column(row, "doc")?)?;
                let comments = comments_by_pizza.remove(&id).unwrap_or_default();
                Ok(PizzaView::assemble(pizza, comments))
            })
            .collect()
    }

    async fn get_pizza(&self, id: &str) -> Result<Option<PizzaView>, StorageError> {
        retry("sql_get", &RetryConfig::query(), || async {
            let mut conn = self.pool.acquire().await.map_err(backend)?;
            match self.fetch_pizza(&mut *conn, id, false).await? {
                Some(pizza) => Ok(Some(self.view(&mut *conn, pizza).await?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn create_pizzas(&self, pizzas: Vec<NewPizza>) -> Result<Vec<PizzaView>, StorageError> {
        let docs = validate_batch(pizzas, Utc::now())?;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        for pizza in &docs {
            sqlx::query("INSERT INTO pizzas (id, doc) VALUES (?, ?)")
                .bind(&pizza.id)
                .bind(encode(&pizza.id, pizza)?)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        debug!(count = docs.len(), "Inserted pizza batch");
        Ok(docs
            .into_iter()
            .map(|p| PizzaView::assemble(p, Vec::new()))
            .collect())
    }

    async fn update_pizza(
        &self,
        id: &str,
        update: PizzaUpdate,
    ) -> Result<Option<PizzaView>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(mut pizza) = self.fetch_pizza(&mut *tx, id, true).await? else {
            return Ok(None);
        };
        update.apply(&mut pizza)?;
        self.write_pizza(&mut *tx, &pizza).await?;
        let view = self.view(&mut *tx, pizza).await?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(view))
    }

    async fn delete_pizza(&self, id: &str) -> Result<Option<PizzaView>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(pizza) = self.fetch_pizza(&mut *tx, id, true).await? else {
            return Ok(None);
        };
        let view = self.view(&mut *tx, pizza).await?;

        sqlx::query("DELETE FROM comments WHERE pizza_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("DELETE FROM pizzas WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(view))
    }

    async fn add_comment(
        &self,
        pizza_id: &str,
        comment: NewComment,
    ) -> Result<Option<PizzaView>, StorageError> {
        let comment = comment.into_comment(Utc::now())?;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(mut pizza) = self.fetch_pizza(&mut *tx, pizza_id, true).await? else {
            return Ok(None);
        };

        sqlx::query("INSERT INTO comments (id, pizza_id, doc) VALUES (?, ?, ?)")
            .bind(&comment.id)
            .bind(pizza_id)
            .bind(encode(&comment.id, &comment)?)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        pizza.comments.push(comment.id);
        self.write_pizza(&mut *tx, &pizza).await?;
        let view = self.view(&mut *tx, pizza).await?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(view))
    }

    async fn add_reply(
        &self,
        pizza_id: &str,
        comment_id: &str,
        reply: NewReply,
    ) -> Result<Option<CommentView>, StorageError> {
        let reply = reply.into_reply(Utc::now())?;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(mut comment) = self.fetch_comment(&mut *tx, pizza_id, comment_id, true).await? else {
            return Ok(None);
        };
        comment.replies.push(reply);
        self.write_comment(&mut *tx, &comment).await?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(CommentView::from(comment)))
    }

    async fn remove_comment(
        &self,
        pizza_id: &str,
        comment_id: &str,
    ) -> Result<Option<PizzaView>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(mut pizza) = self.fetch_pizza(&mut *tx, pizza_id, true).await? else {
            return Ok(None);
        };
        let before = pizza.comments.len();
        pizza.comments.retain(|id| id != comment_id);
        if pizza.comments.len() == before {
            return Ok(None);
        }

        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        self.write_pizza(&mut *tx, &pizza).await?;
        let view = self.view(&mut *tx, pizza).await?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(view))
    }

    async fn remove_reply(
        &self,
        pizza_id: &str,
        comment_id: &str,
        reply_id: &str,
    ) -> Result<Option<CommentView>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(mut comment) = self.fetch_comment(&mut *tx, pizza_id, comment_id, true).await? else {
            return Ok(None);
        };
        if !comment.pull_reply(reply_id) {
            return Ok(None);
        }
        self.write_comment(&mut *tx, &comment).await?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(CommentView::from(comment)))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
