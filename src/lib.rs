// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Pizza Hunt
//!
//! A pizza-sharing service with comments and replies, plus an offline-first
//! client that queues creations locally while the server is unreachable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client side                         │
//! │  • PizzaSubmitter: send now, or queue on network failure    │
//! │  • PendingQueue: SQLite file of unsent creations            │
//! │  • ConnectivityMonitor: online/offline via watch channel    │
//! │  • SyncAgent: one batched upload per reconnect              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                     (HTTP, JSON bodies)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server side                         │
//! │  • axum router over /api/pizzas and /api/comments           │
//! │  • DocumentStore: in-memory (DashMap) or SQLite/MySQL       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pizza_hunt::{AppState, InMemoryStore, NewPizza, DocumentStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryStore::new());
//!     let created = store
//!         .create_pizza(NewPizza::new("Margherita", "Ann").with_toppings(["basil"]))
//!         .await
//!         .expect("valid pizza");
//!     assert_eq!(created.comment_count, 0);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3001").await.unwrap();
//!     pizza_hunt::server::serve_on(listener, AppState::new(store), pizza_hunt::server::shutdown_signal())
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`model`]: pizzas, comments, replies and their validation
//! - [`storage`]: document stores (memory, SQL)
//! - [`server`]: HTTP routes and error mapping
//! - [`queue`]: local pending-write queue
//! - [`client`]: HTTP client and send-or-queue submitter
//! - [`sync`]: replay of queued writes on reconnect
//! - [`resilience`]: store retry and connectivity monitoring

pub mod client;
pub mod config;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod resilience;
pub mod server;
pub mod storage;
pub mod sync;

pub use client::{ClientError, HttpPizzaClient, PizzaApi, PizzaSubmitter, SubmitError, SubmitOutcome};
pub use config::{ConfigError, PizzaHuntConfig};
pub use metrics::LatencyTimer;
pub use model::{
    Comment, CommentView, NewComment, NewPizza, NewReply, Pizza, PizzaSize, PizzaUpdate,
    PizzaView, Reply, ValidationError,
};
pub use queue::{PendingQueue, PendingWrite, QueueError, QueueStats};
pub use resilience::{ConnectivityMonitor, RetryConfig};
pub use server::{router, AppState, ServeError};
pub use storage::{DocumentStore, InMemoryStore, SqlStore, StorageError};
pub use sync::{DrainOutcome, SyncAgent, SyncError, SyncStats};
