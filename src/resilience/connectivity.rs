// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Online/offline tracking for the client side.
//!
//! Two inputs move the state: outcomes of real requests
//! ([`ConnectivityMonitor::record_success`] / [`ConnectivityMonitor::record_failure`])
//! and an explicit environment signal ([`ConnectivityMonitor::set_online`]).
//! A background probe loop pings the server so an offline client notices when
//! the server comes back without having to send anything.
//!
//! Every change is published on a `watch` channel. The sync agent subscribes
//! and drains the queue on each offline→online edge.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::client::PizzaApi;

pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    /// Consecutive failure count
    failures: AtomicU32,
    /// Failures needed before flipping offline
    threshold: u32,
    /// Bumped on every offline→online change
    reconnects: AtomicU64,
    /// One probe at a time
    probing: Mutex<()>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool, failure_threshold: u32) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state,
            failures: AtomicU32::new(0),
            threshold: failure_threshold.max(1),
            reconnects: AtomicU64::new(0),
            probing: Mutex::new(()),
        }
    }

    /// A request reached the server.
    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        self.set_online(true);
    }

    /// A request failed at the network level.
    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(failures, threshold = self.threshold, "Network failure recorded");
        if failures >= self.threshold {
            self.set_online(false);
        }
    }

    /// Explicit environment signal. Subscribers are only woken on a change.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                if online {
                    self.reconnects.fetch_add(1, Ordering::AcqRel);
                }
                *current = online;
                true
            }
        });
        if changed {
            if online {
                info!("Connectivity restored");
            } else {
                warn!(failures = self.failure_count(), "Connectivity lost, creations will queue locally");
            }
            crate::metrics::set_online(online);
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Count of offline→online changes so far.
    ///
    /// A `watch` receiver only keeps the latest value, so a quick
    /// online→offline→online flip looks like no change at all. Comparing
    /// generations catches it.
    #[must_use]
    pub fn reconnect_generation(&self) -> u64 {
        self.reconnects.load(Ordering::Acquire)
    }

    /// Receiver that sees every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Ping the server once and record the outcome.
    ///
    /// Only network failures count against connectivity: a server that
    /// answers with an error status is still reachable.
    pub async fn probe(&self, api: &dyn PizzaApi) -> bool {
        let _guard = self.probing.lock().await;

        match api.ping().await {
            Ok(()) => {
                self.record_success();
                true
            }
            Err(e) if e.is_network() => {
                debug!(error = %e, "Probe failed");
                self.record_failure();
                false
            }
            Err(e) => {
                debug!(error = %e, "Probe reached server with an error status");
                self.record_success();
                true
            }
        }
    }

    /// Probe at a fixed interval until `shutdown` flips to true.
    #[tracing::instrument(skip_all, fields(interval = ?interval))]
    pub async fn run_probes(
        self: Arc<Self>,
        api: Arc<dyn PizzaApi>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe(api.as_ref()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Probe loop stopping");
                        break;
                    }
                }
            }
        }
    }
}
