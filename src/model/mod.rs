// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document types for pizzas, comments and replies.
//!
//! Stored documents ([`Pizza`], [`Comment`]) hold references and embedded
//! replies. Views ([`PizzaView`], [`CommentView`]) are what the HTTP layer
//! returns: comments populated, derived counts filled in.
//!
//! Input payloads ([`NewPizza`], [`NewComment`], [`NewReply`], [`PizzaUpdate`])
//! are validated on the way into a store, the same checks for every backend.

mod comment;
mod pizza;

pub use comment::{Comment, CommentView, NewComment, NewReply, Reply};
pub use pizza::{NewPizza, Pizza, PizzaSize, PizzaUpdate, PizzaView};

use thiserror::Error;

/// A required field was missing or blank after trimming.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// Wire name of the offending field
    pub field: &'static str,
    /// Human readable message returned to the client
    pub message: &'static str,
}

impl ValidationError {
    pub(crate) const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Trim `value` and reject it if nothing is left.
pub(crate) fn required(
    value: String,
    field: &'static str,
    message: &'static str,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}

/// Generate a new document id.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
