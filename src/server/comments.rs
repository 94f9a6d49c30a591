// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use super::error::{ApiError, COMMENT_NOT_FOUND, PIZZA_NOT_FOUND};
use super::found;
use super::state::AppState;
use crate::metrics::LatencyTimer;
use crate::model::{CommentView, NewComment, NewReply, PizzaView};

pub async fn add_comment(
    State(state): State<AppState>,
    Path(pizza_id): Path<String>,
    body: Result<Json<NewComment>, JsonRejection>,
) -> Result<Json<PizzaView>, ApiError> {
    let _timer = LatencyTimer::new("store", "comment");
    let Json(comment) = body?;
    let pizza = found(
        "add_comment",
        state.store.add_comment(&pizza_id, comment).await,
        PIZZA_NOT_FOUND,
    )?;
    info!(pizza = %pizza.id, comments = pizza.comments.len(), "Comment added");
    Ok(Json(pizza))
}

pub async fn add_reply(
    State(state): State<AppState>,
    Path((pizza_id, comment_id)): Path<(String, String)>,
    body: Result<Json<NewReply>, JsonRejection>,
) -> Result<Json<CommentView>, ApiError> {
    let _timer = LatencyTimer::new("store", "reply");
    let Json(reply) = body?;
    found(
        "add_reply",
        state.store.add_reply(&pizza_id, &comment_id, reply).await,
        COMMENT_NOT_FOUND,
    )
    .map(Json)
}

pub async fn remove_comment(
    State(state): State<AppState>,
    Path((pizza_id, comment_id)): Path<(String, String)>,
) -> Result<Json<PizzaView>, ApiError> {
    let _timer = LatencyTimer::new("store", "remove_comment");
    found(
        "remove_comment",
        state.store.remove_comment(&pizza_id, &comment_id).await,
        COMMENT_NOT_FOUND,
    )
    .map(Json)
}

pub async fn remove_reply(
    State(state): State<AppState>,
    Path((pizza_id, comment_id, reply_id)): Path<(String, String, String)>,
) -> Result<Json<CommentView>, ApiError> {
    let _timer = LatencyTimer::new("store", "remove_reply");
    found(
        "remove_reply",
        state
            .store
            .remove_reply(&pizza_id, &comment_id, &reply_id)
            .await,
        COMMENT_NOT_FOUND,
    )
    .map(Json)
}
