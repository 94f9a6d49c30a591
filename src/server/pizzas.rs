// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::error::{ApiError, PIZZA_NOT_FOUND};
use super::{found, tracked};
use super::state::AppState;
use crate::metrics::LatencyTimer;
use crate::model::{NewPizza, PizzaUpdate, PizzaView};

/// `POST /api/pizzas` accepts a single pizza or, from the sync agent, an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<NewPizza>),
    One(NewPizza),
}

pub async fn list_pizzas(State(state): State<AppState>) -> Result<Json<Vec<PizzaView>>, ApiError> {
    let _timer = LatencyTimer::new("store", "list");
    let pizzas = tracked("list", state.store.list_pizzas().await)?;
    debug!(count = pizzas.len(), "Listed pizzas");
    Ok(Json(pizzas))
}

pub async fn get_pizza(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PizzaView>, ApiError> {
    let _timer = LatencyTimer::new("store", "get");
    found("get", state.store.get_pizza(&id).await, PIZZA_NOT_FOUND).map(Json)
}

pub async fn create_pizza(
    State(state): State<AppState>,
    body: Result<Json<OneOrMany>, JsonRejection>,
) -> Result<Response, ApiError> {
    let _timer = LatencyTimer::new("store", "create");
    let Json(body) = body?;

    match body {
        OneOrMany::One(pizza) => {
            let created = tracked("create", state.store.create_pizza(pizza).await)?;
            info!(id = %created.id, name = %created.pizza_name, "Pizza created");
            Ok(Json(created).into_response())
        }
        OneOrMany::Many(pizzas) => {
            let count = pizzas.len();
            let created = tracked("create_batch", state.store.create_pizzas(pizzas).await)?;
            info!(count, "Pizza batch created");
            Ok(Json(created).into_response())
        }
    }
}

pub async fn update_pizza(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<PizzaUpdate>, JsonRejection>,
) -> Result<Json<PizzaView>, ApiError> {
    let _timer = LatencyTimer::new("store", "update");
    let Json(update) = body?;
    found("update", state.store.update_pizza(&id, update).await, PIZZA_NOT_FOUND).map(Json)
}

pub async fn delete_pizza(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PizzaView>, ApiError> {
    let _timer = LatencyTimer::new("store", "delete");
    let deleted = found("delete", state.store.delete_pizza(&id).await, PIZZA_NOT_FOUND)?;
    info!(id = %deleted.id, comments = deleted.comments.len(), "Pizza deleted");
    Ok(Json(deleted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shapes() {
        let one: OneOrMany =
            serde_json::from_str(r#"{"pizzaName":"A","createdBy":"B"}"#).unwrap();
        assert!(matches!(one, OneOrMany::One(_)));

        let many: OneOrMany = serde_json::from_str(
            r#"[{"pizzaName":"A","createdBy":"B"},{"pizzaName":"C","createdBy":"D"}]"#,
        )
        .unwrap();
        assert!(matches!(many, OneOrMany::Many(ref v) if v.len() == 2));

        assert!(serde_json::from_str::<OneOrMany>("42").is_err());
    }
}
