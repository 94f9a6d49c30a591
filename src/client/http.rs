// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ClientError, PizzaApi};
use crate::model::{NewPizza, PizzaView};

/// Shape of the server's error bodies.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn classify(e: reqwest::Error) -> ClientError {
    if e.is_builder() {
        ClientError::Invalid(e.to_string())
    } else if e.is_decode() {
        ClientError::Decode(e.to_string())
    } else {
        ClientError::Network(e.to_string())
    }
}

/// reqwest-backed [`PizzaApi`] for a pizza-hunt server.
#[derive(Clone)]
pub struct HttpPizzaClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPizzaClient {
    /// `timeout` bounds each whole request, connect included.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Invalid(e.to_string()))?;
        Ok(Self::with_http_client(base_url, http))
    }

    /// Reuse an existing reqwest client (shared pool, custom proxy or TLS setup).
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(classify)
    }
}

#[async_trait]
impl PizzaApi for HttpPizzaClient {
    async fn create_pizza(&self, pizza: &NewPizza) -> Result<PizzaView, ClientError> {
        debug!(url = %self.base_url, pizza = %pizza.pizza_name, "POST /api/pizzas");
        let response = self
            .http
            .post(self.url("/api/pizzas"))
            .json(pizza)
            .send()
            .await
            .map_err(classify)?;
        Self::read(response).await
    }

    async fn create_pizzas(&self, pizzas: &[NewPizza]) -> Result<Vec<PizzaView>, ClientError> {
        debug!(url = %self.base_url, count = pizzas.len(), "POST /api/pizzas (batch)");
        let response = self
            .http
            .post(self.url("/api/pizzas"))
            .json(pizzas)
            .send()
            .await
            .map_err(classify)?;
        Self::read(response).await
    }

    async fn ping(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(classify)?;
        let _: serde_json::Value = Self::read(response).await?;
        Ok(())
    }
}
