// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    CommentView, NewComment, NewPizza, NewReply, PizzaUpdate, PizzaView, ValidationError,
};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Malformed document '{id}': {reason}")]
    Malformed { id: String, reason: String },
}

/// Document store for pizzas and their comments.
///
/// "Not found" is `Ok(None)`, never an error, so callers can tell it apart
/// from a failing backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every pizza in insertion order, comments populated.
    async fn list_pizzas(&self) -> Result<Vec<PizzaView>, StorageError>;

    async fn get_pizza(&self, id: &str) -> Result<Option<PizzaView>, StorageError>;

    /// Insert a batch of pizzas. All-or-nothing: if any payload fails
    /// validation nothing is stored. Results keep the input order.
    async fn create_pizzas(&self, pizzas: Vec<NewPizza>) -> Result<Vec<PizzaView>, StorageError>;

    /// Insert one pizza.
    async fn create_pizza(&self, pizza: NewPizza) -> Result<PizzaView, StorageError> {
        let mut created = self.create_pizzas(vec![pizza]).await?;
        created
            .pop()
            .ok_or_else(|| StorageError::Backend("insert returned no document".to_string()))
    }

    /// Merge `update` into the stored pizza and return the new version.
    async fn update_pizza(
        &self,
        id: &str,
        update: PizzaUpdate,
    ) -> Result<Option<PizzaView>, StorageError>;

    /// Remove a pizza and its comments, returning what was removed.
    async fn delete_pizza(&self, id: &str) -> Result<Option<PizzaView>, StorageError>;

    /// Create a comment and append its id to the pizza. Returns the updated pizza.
    async fn add_comment(
        &self,
        pizza_id: &str,
        comment: NewComment,
    ) -> Result<Option<PizzaView>, StorageError>;

    /// Append a reply to a comment. Returns the updated comment.
    async fn add_reply(
        &self,
        pizza_id: &str,
        comment_id: &str,
        reply: NewReply,
    ) -> Result<Option<CommentView>, StorageError>;

    /// Delete a comment and pull its id from the pizza. Returns the updated pizza.
    async fn remove_comment(
        &self,
        pizza_id: &str,
        comment_id: &str,
    ) -> Result<Option<PizzaView>, StorageError>;

    /// Pull one reply from a comment. Returns the updated comment.
    async fn remove_reply(
        &self,
        pizza_id: &str,
        comment_id: &str,
        reply_id: &str,
    ) -> Result<Option<CommentView>, StorageError>;

    /// Cheap liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Validate a whole batch before anything is written.
pub(crate) fn validate_batch(
    pizzas: Vec<NewPizza>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<crate::model::Pizza>, StorageError> {
    pizzas
        .into_iter()
        .map(|p| p.into_pizza(now).map_err(StorageError::from))
        .collect()
}
