// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP surface.
//!
//! | route | handler |
//! |-------|---------|
//! | `GET/POST /api/pizzas` | [`pizzas::list_pizzas`], [`pizzas::create_pizza`] |
//! | `GET/PUT/DELETE /api/pizzas/:id` | [`pizzas::get_pizza`], [`pizzas::update_pizza`], [`pizzas::delete_pizza`] |
//! | `POST /api/comments/:pizzaId` | [`comments::add_comment`] |
//! | `PUT/DELETE /api/comments/:pizzaId/:commentId` | [`comments::add_reply`], [`comments::remove_comment`] |
//! | `DELETE /api/comments/:pizzaId/:commentId/:replyId` | [`comments::remove_reply`] |
//! | `GET /health` | store ping |

pub mod comments;
pub mod error;
pub mod pizzas;
pub mod state;

use std::future::Future;
use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::PizzaHuntConfig;
use crate::storage::StorageError;
use error::ApiError;
pub use state::AppState;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("document store unavailable: {0}")]
    Store(#[from] StorageError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/pizzas", get(pizzas::list_pizzas).post(pizzas::create_pizza))
        .route(
            "/api/pizzas/:id",
            get(pizzas::get_pizza)
                .put(pizzas::update_pizza)
                .delete(pizzas::delete_pizza),
        )
        .route("/api/comments/:pizza_id", post(comments::add_comment))
        .route(
            "/api/comments/:pizza_id/:comment_id",
            put(comments::add_reply).delete(comments::remove_comment),
        )
        .route(
            "/api/comments/:pizza_id/:comment_id/:reply_id",
            delete(comments::remove_reply),
        )
        .route("/health", get(health))
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the configured store, bind, and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &PizzaHuntConfig) -> Result<(), ServeError> {
    info!("Initializing state...");
    let state = AppState::from_config(config).await?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;
    info!(addr = %config.bind_addr, "Server running");

    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server shut down");
    Ok(())
}

async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => Json(json!({"status": "ok"})).into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    crate::metrics::record_request(&method, &route, response.status().as_u16());
    response
}

/// Unwrap a lookup result, turning `None` into a 404 with `missing` as message.
fn found<T>(
    operation: &'static str,
    result: Result<Option<T>, StorageError>,
    missing: &'static str,
) -> Result<T, ApiError> {
    match result {
        Ok(Some(value)) => tracked(operation, Ok(value)),
        Ok(None) => {
            crate::metrics::record_store_operation(operation, "not_found");
            Err(ApiError::NotFound(missing))
        }
        Err(e) => tracked(operation, Err(e)),
    }
}

fn tracked<T>(operation: &'static str, result: Result<T, StorageError>) -> Result<T, ApiError> {
    let status = match &result {
        Ok(_) => "success",
        Err(StorageError::Validation(_)) => "invalid",
        Err(_) => "error",
    };
    crate::metrics::record_store_operation(operation, status);
    result.map_err(ApiError::from)
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
