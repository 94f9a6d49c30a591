// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document stores for pizzas and comments.
//!
//! - [`memory::InMemoryStore`]: process-local, used when no database URL is set
//! - [`sql::SqlStore`]: SQLite or MySQL through the sqlx `Any` driver

pub mod memory;
pub mod sql;
pub mod traits;

pub use memory::InMemoryStore;
pub use sql::SqlStore;
pub use traits::{DocumentStore, StorageError};
