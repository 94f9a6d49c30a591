// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Send-or-queue path for pizza creation.
//!
//! ```text
//! attempt-network ──ok──────────────────────────▶ Created
//!        │
//!        ├──network failure──▶ queue-locally ───▶ Queued { seq }
//!        │
//!        └──error status─────────────────────────▶ SubmitError::Rejected
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::{ClientError, PizzaApi};
use crate::model::{NewPizza, PizzaView, ValidationError};
use crate::queue::{PendingQueue, QueueError};
use crate::resilience::ConnectivityMonitor;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server stored it
    Created(PizzaView),
    /// The server was unreachable; the payload waits in the local queue
    Queued { seq: u64 },
}

#[derive(Error, Debug)]
pub enum SubmitError {
    /// Caught before any network call so nothing unsendable is queued.
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Rejected(ClientError),
    #[error("server unreachable and local queue failed: {0}")]
    Queue(#[from] QueueError),
}

pub struct PizzaSubmitter {
    api: Arc<dyn PizzaApi>,
    queue: Arc<PendingQueue>,
    connectivity: Arc<ConnectivityMonitor>,
}

impl PizzaSubmitter {
    pub fn new(
        api: Arc<dyn PizzaApi>,
        queue: Arc<PendingQueue>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            api,
            queue,
            connectivity,
        }
    }

    /// Try the server; on a network failure queue the payload instead.
    pub async fn submit(&self, pizza: NewPizza) -> Result<SubmitOutcome, SubmitError> {
        let pizza = match pizza.validate() {
            Ok(p) => p,
            Err(e) => {
                crate::metrics::record_submit("invalid");
                return Err(e.into());
            }
        };

        match self.api.create_pizza(&pizza).await {
            Ok(created) => {
                self.connectivity.record_success();
                crate::metrics::record_submit("created");
                info!(id = %created.id, name = %created.pizza_name, "Pizza created");
                Ok(SubmitOutcome::Created(created))
            }
            Err(e) if e.is_network() => {
                self.connectivity.record_failure();
                warn!(error = %e, name = %pizza.pizza_name, "Server unreachable, queueing pizza");
                match self.queue.enqueue(&pizza).await {
                    Ok(seq) => {
                        crate::metrics::record_submit("queued");
                        Ok(SubmitOutcome::Queued { seq })
                    }
                    Err(qe) => {
                        crate::metrics::record_submit("failed");
                        Err(qe.into())
                    }
                }
            }
            Err(e) => {
                // Server answered, so it is reachable even though it said no.
                self.connectivity.record_success();
                crate::metrics::record_submit("rejected");
                Err(SubmitError::Rejected(e))
            }
        }
    }
}
