// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry for store connections and connectivity tracking for the client.

pub mod connectivity;
pub mod retry;

pub use connectivity::ConnectivityMonitor;
pub use retry::RetryConfig;
