// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replays queued creations once the server is reachable again.
//!
//! The [`SyncAgent`] reads the whole pending queue, uploads it as one batch
//! and clears exactly what it sent. It runs on start (if online) and on every
//! offline→online edge reported by the
//! [`ConnectivityMonitor`](crate::resilience::ConnectivityMonitor).

mod agent;

pub use agent::{DrainOutcome, SyncAgent, SyncError, SyncStats};
