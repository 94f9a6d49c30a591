// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::model::ValidationError;
use crate::storage::StorageError;

pub const PIZZA_NOT_FOUND: &str = "No pizza found by that id!";
pub const COMMENT_NOT_FOUND: &str = "No comment found with this id!";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(ValidationError),
    #[error("{0}")]
    MalformedBody(String),
    #[error("{0}")]
    Store(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Validation(v) => ApiError::Validation(v),
            other => ApiError::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::MalformedBody(e.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Store failures are reported as 400 like any other bad request.
        let (status, field) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ApiError::Validation(v) => (StatusCode::BAD_REQUEST, Some(v.field)),
            ApiError::MalformedBody(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Store(e) => {
                warn!(error = %e, "Store operation failed");
                (StatusCode::BAD_REQUEST, None)
            }
        };

        let body = ErrorBody {
            message: self.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}
