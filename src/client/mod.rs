// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Client side of pizza creation.
//!
//! [`PizzaApi`] is the seam between the offline machinery and the network:
//! [`HttpPizzaClient`] talks to a running server, tests substitute their own.
//! [`PizzaSubmitter`] decides per creation whether to send it now or queue it.

pub mod http;
pub mod submit;

pub use http::HttpPizzaClient;
pub use submit::{PizzaSubmitter, SubmitError, SubmitOutcome};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{NewPizza, PizzaView};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request never got an HTTP response: refused, reset, DNS, timeout.
    #[error("network unavailable: {0}")]
    Network(String),
    /// The server answered with a non-success status.
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The server answered 2xx but the body was not what we expected.
    #[error("unexpected response body: {0}")]
    Decode(String),
    /// The request could not be built (bad base URL and similar).
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl ClientError {
    /// Only network failures are worth queueing for later; everything else
    /// would fail the same way on replay.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

/// Remote pizza API as seen by the offline machinery.
#[async_trait]
pub trait PizzaApi: Send + Sync {
    async fn create_pizza(&self, pizza: &NewPizza) -> Result<PizzaView, ClientError>;

    /// Create several pizzas in one request. The server is all-or-nothing.
    async fn create_pizzas(&self, pizzas: &[NewPizza]) -> Result<Vec<PizzaView>, ClientError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_queueable() {
        assert!(ClientError::Network("refused".into()).is_network());
        assert!(!ClientError::Rejected { status: 400, message: "bad".into() }.is_network());
        assert!(!ClientError::Decode("eof".into()).is_network());
        assert!(!ClientError::Invalid("url".into()).is_network());
    }
}
