// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comment::{Comment, CommentView};
use super::{new_id, required, ValidationError};

/// The fixed set of sizes a pizza can be ordered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PizzaSize {
    Personal,
    Small,
    Medium,
    #[default]
    Large,
    #[serde(rename = "Extra Large")]
    ExtraLarge,
}

impl PizzaSize {
    pub const ALL: [PizzaSize; 5] = [
        PizzaSize::Personal,
        PizzaSize::Small,
        PizzaSize::Medium,
        PizzaSize::Large,
        PizzaSize::ExtraLarge,
    ];
}

impl std::fmt::Display for PizzaSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Personal => write!(f, "Personal"),
            Self::Small => write!(f, "Small"),
            Self::Medium => write!(f, "Medium"),
            Self::Large => write!(f, "Large"),
            Self::ExtraLarge => write!(f, "Extra Large"),
        }
    }
}

impl std::str::FromStr for PizzaSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown pizza size '{s}'"))
    }
}

/// Pizza creation payload.
///
/// This is also the unit held by the offline queue, so it must stay plain
/// serializable data. Missing text fields deserialize as empty and are
/// rejected by [`NewPizza::validate`], which keeps the "required" messages
/// under our control instead of the JSON extractor's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPizza {
    #[serde(default)]
    pub pizza_name: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub size: PizzaSize,
    #[serde(default)]
    pub toppings: Vec<String>,
}

impl NewPizza {
    pub fn new(pizza_name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            pizza_name: pizza_name.into(),
            created_by: created_by.into(),
            size: PizzaSize::default(),
            toppings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: PizzaSize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_toppings<I, S>(mut self, toppings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.toppings = toppings.into_iter().map(Into::into).collect();
        self
    }

    /// Trim and check required fields.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            pizza_name: required(self.pizza_name, "pizzaName", "You need a name for your pizza")?,
            created_by: required(self.created_by, "createdBy", "Please tell us who is the creator")?,
            size: self.size,
            toppings: self.toppings,
        })
    }

    /// Validate and stamp with a fresh id and creation time.
    pub fn into_pizza(self, now: DateTime<Utc>) -> Result<Pizza, ValidationError> {
        let valid = self.validate()?;
        Ok(Pizza {
            id: new_id(),
            pizza_name: valid.pizza_name,
            created_by: valid.created_by,
            created_at: now,
            size: valid.size,
            toppings: valid.toppings,
            comments: Vec::new(),
        })
    }
}

/// Partial update: only the provided fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PizzaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pizza_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<PizzaSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toppings: Option<Vec<String>>,
}

impl PizzaUpdate {
    /// Apply to `pizza`. Nothing is written unless every provided field is valid.
    pub fn apply(self, pizza: &mut Pizza) -> Result<(), ValidationError> {
        let pizza_name = self
            .pizza_name
            .map(|v| required(v, "pizzaName", "You need a name for your pizza"))
            .transpose()?;
        let created_by = self
            .created_by
            .map(|v| required(v, "createdBy", "Please tell us who is the creator"))
            .transpose()?;

        if let Some(name) = pizza_name {
            pizza.pizza_name = name;
        }
        if let Some(by) = created_by {
            pizza.created_by = by;
        }
        if let Some(size) = self.size {
            pizza.size = size;
        }
        if let Some(toppings) = self.toppings {
            pizza.toppings = toppings;
        }
        Ok(())
    }
}

/// Stored pizza document. `comments` holds Comment ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pizza {
    #[serde(rename = "_id")]
    pub id: String,
    pub pizza_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub size: PizzaSize,
    pub toppings: Vec<String>,
    pub comments: Vec<String>,
}

/// Pizza as returned over HTTP: comments populated, `commentCount` derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PizzaView {
    #[serde(rename = "_id")]
    pub id: String,
    pub pizza_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub size: PizzaSize,
    pub toppings: Vec<String>,
    pub comments: Vec<CommentView>,
    pub comment_count: usize,
}

impl PizzaView {
    /// Join `pizza` with its comments, in the order the pizza references them.
    ///
    /// `comments` may contain unrelated comments; ids with no matching comment
    /// are skipped.
    pub fn assemble(pizza: Pizza, comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut by_id: HashMap<String, Comment> =
            comments.into_iter().map(|c| (c.id.clone(), c)).collect();

        let comments: Vec<CommentView> = pizza
            .comments
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(CommentView::from)
            .collect();

        Self {
            id: pizza.id,
            pizza_name: pizza.pizza_name,
            created_by: pizza.created_by,
            created_at: pizza.created_at,
            size: pizza.size,
            toppings: pizza.toppings,
            comment_count: comment_count(&comments),
            comments,
        }
    }
}

/// Every comment counts once, plus each of its replies.
pub(crate) fn comment_count(comments: &[CommentView]) -> usize {
    comments.iter().map(|c| 1 + c.reply_count).sum()
}
