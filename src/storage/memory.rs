// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::traits::{validate_batch, DocumentStore, StorageError};
use crate::model::{
    Comment, CommentView, NewComment, NewPizza, NewReply, Pizza, PizzaUpdate, PizzaView,
};

/// In-process document store.
///
/// Pizzas carry an insertion sequence so listing is stable even though
/// `DashMap` iteration order is not.
pub struct InMemoryStore {
    pizzas: DashMap<String, (u64, Pizza)>,
    comments: DashMap<String, Comment>,
    next_seq: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pizzas: DashMap::new(),
            comments: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Number of stored pizzas
    #[must_use]
    pub fn len(&self) -> usize {
        self.pizzas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pizzas.is_empty()
    }

    /// Number of stored comments (across all pizzas)
    #[must_use]
    pub fn comment_len(&self) -> usize {
        self.comments.len()
    }

    fn view(&self, pizza: Pizza) -> PizzaView {
        let comments: Vec<Comment> = pizza
            .comments
            .iter()
            .filter_map(|id| self.comments.get(id).map(|c| c.value().clone()))
            .collect();
        PizzaView::assemble(pizza, comments)
    }

    fn pizza_references(&self, pizza_id: &str, comment_id: &str) -> bool {
        self.pizzas
            .get(pizza_id)
            .is_some_and(|entry| entry.1.comments.iter().any(|c| c == comment_id))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_pizzas(&self) -> Result<Vec<PizzaView>, StorageError> {
        let mut rows: Vec<(u64, Pizza)> = self
            .pizzas
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, p)| self.view(p)).collect())
    }

    async fn get_pizza(&self, id: &str) -> Result<Option<PizzaView>, StorageError> {
        let pizza = self.pizzas.get(id).map(|entry| entry.1.clone());
        Ok(pizza.map(|p| self.view(p)))
    }

    async fn create_pizzas(&self, pizzas: Vec<NewPizza>) -> Result<Vec<PizzaView>, StorageError> {
        let docs = validate_batch(pizzas, Utc::now())?;

        let mut created = Vec::with_capacity(docs.len());
        for pizza in docs {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            self.pizzas.insert(pizza.id.clone(), (seq, pizza.clone()));
            created.push(PizzaView::assemble(pizza, Vec::new()));
        }
        Ok(created)
    }

    async fn update_pizza(
        &self,
        id: &str,
        update: PizzaUpdate,
    ) -> Result<Option<PizzaView>, StorageError> {
        let updated = {
            let Some(mut entry) = self.pizzas.get_mut(id) else {
                return Ok(None);
            };
            let mut next = entry.1.clone();
            update.apply(&mut next)?;
            entry.1 = next.clone();
            next
        };
        Ok(Some(self.view(updated)))
    }

    async fn delete_pizza(&self, id: &str) -> Result<Option<PizzaView>, StorageError> {
        let Some((_, (_, pizza))) = self.pizzas.remove(id) else {
            return Ok(None);
        };
        let view = self.view(pizza);
        for comment in &view.comments {
            self.comments.remove(&comment.comment.id);
        }
        Ok(Some(view))
    }

    async fn add_comment(
        &self,
        pizza_id: &str,
        comment: NewComment,
    ) -> Result<Option<PizzaView>, StorageError> {
        let comment = comment.into_comment(Utc::now())?;

        let updated = {
            let Some(mut entry) = self.pizzas.get_mut(pizza_id) else {
                return Ok(None);
            };
            entry.1.comments.push(comment.id.clone());
            self.comments.insert(comment.id.clone(), comment);
            entry.1.clone()
        };
        Ok(Some(self.view(updated)))
    }

    async fn add_reply(
        &self,
        pizza_id: &str,
        comment_id: &str,
        reply: NewReply,
    ) -> Result<Option<CommentView>, StorageError> {
        let reply = reply.into_reply(Utc::now())?;

        if !self.pizza_references(pizza_id, comment_id) {
            return Ok(None);
        }
        let Some(mut comment) = self.comments.get_mut(comment_id) else {
            return Ok(None);
        };
        comment.replies.push(reply);
        Ok(Some(CommentView::from(comment.clone())))
    }

    async fn remove_comment(
        &self,
        pizza_id: &str,
        comment_id: &str,
    ) -> Result<Option<PizzaView>, StorageError> {
        let updated = {
            let Some(mut entry) = self.pizzas.get_mut(pizza_id) else {
                return Ok(None);
            };
            let before = entry.1.comments.len();
            entry.1.comments.retain(|id| id != comment_id);
            if entry.1.comments.len() == before {
                return Ok(None);
            }
            self.comments.remove(comment_id);
            entry.1.clone()
        };
        Ok(Some(self.view(updated)))
    }

    async fn remove_reply(
        &self,
        pizza_id: &str,
        comment_id: &str,
        reply_id: &str,
    ) -> Result<Option<CommentView>, StorageError> {
        if !self.pizza_references(pizza_id, comment_id) {
            return Ok(None);
        }
        let Some(mut comment) = self.comments.get_mut(comment_id) else {
            return Ok(None);
        };
        if !comment.pull_reply(reply_id) {
            return Ok(None);
        }
        Ok(Some(CommentView::from(comment.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PizzaSize;

    fn pizza(name: &str) -> NewPizza {
        NewPizza::new(name, "Tester").with_toppings(["cheese"])
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert!(store.list_pizzas().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryStore::new();
        let created = store.create_pizza(pizza("Margherita")).await.unwrap();

        let fetched = store.get_pizza(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.pizza_name, "Margherita");
        assert_eq!(fetched.size, PizzaSize::Large);
        assert_eq!(fetched.comment_count, 0);
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get_pizza("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let store = InMemoryStore::new();
        store
            .create_pizzas(vec![pizza("A"), pizza("B"), pizza("C")])
            .await
            .unwrap();
        store.create_pizza(pizza("D")).await.unwrap();

        let names: Vec<String> = store
            .list_pizzas()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.pizza_name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_invalid_batch_stores_nothing() {
        let store = InMemoryStore::new();
        let result = store
            .create_pizzas(vec![pizza("Ok"), NewPizza::new("", "Nobody")])
            .await;

        assert!(matches!(result, Err(StorageError::Validation(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_returns_new_version() {
        let store = InMemoryStore::new();
        let created = store.create_pizza(pizza("Old")).await.unwrap();

        let update = PizzaUpdate {
            pizza_name: Some("New".into()),
            ..Default::default()
        };
        let updated = store.update_pizza(&created.id, update).await.unwrap().unwrap();
        assert_eq!(updated.pizza_name, "New");

        let fetched = store.get_pizza(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.pizza_name, "New");
    }

    #[tokio::test]
    async fn test_update_nonexistent_returns_none() {
        let store = InMemoryStore::new();
        let result = store
            .update_pizza("nope", PizzaUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_deleted_and_cascades() {
        let store = InMemoryStore::new();
        let created = store.create_pizza(pizza("Doomed")).await.unwrap();
        store
            .add_comment(&created.id, NewComment::new("Ann", "bye"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.comment_len(), 1);

        let deleted = store.delete_pizza(&created.id).await.unwrap().unwrap();
        assert_eq!(deleted.id, created.id);
        assert_eq!(deleted.comments.len(), 1);
        assert!(store.is_empty());
        assert_eq!(store.comment_len(), 0);

        assert!(store.delete_pizza(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comment_and_reply_lifecycle() {
        let store = InMemoryStore::new();
        let p = store.create_pizza(pizza("Chatty")).await.unwrap();

        let p = store
            .add_comment(&p.id, NewComment::new("Ann", "Great"))
            .await
            .unwrap()
            .unwrap();
        let comment_id = p.comments[0].comment.id.clone();

        let c = store
            .add_reply(&p.id, &comment_id, NewReply::new("Bo", "Agreed"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.reply_count, 1);
        let reply_id = c.comment.replies[0].reply_id.clone();

        let p_after = store.get_pizza(&p.id).await.unwrap().unwrap();
        assert_eq!(p_after.comment_count, 2);

        let c = store
            .remove_reply(&p.id, &comment_id, &reply_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.reply_count, 0);

        let p = store.remove_comment(&p.id, &comment_id).await.unwrap().unwrap();
        assert!(p.comments.is_empty());
        assert_eq!(store.comment_len(), 0);
    }

    #[tokio::test]
    async fn test_comment_on_missing_pizza() {
        let store = InMemoryStore::new();
        let result = store
            .add_comment("nope", NewComment::new("Ann", "hi"))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.comment_len(), 0);
    }

    #[tokio::test]
    async fn test_reply_requires_comment_on_that_pizza() {
        let store = InMemoryStore::new();
        let a = store.create_pizza(pizza("A")).await.unwrap();
        let b = store.create_pizza(pizza("B")).await.unwrap();
        let a = store
            .add_comment(&a.id, NewComment::new("Ann", "hi"))
            .await
            .unwrap()
            .unwrap();
        let comment_id = a.comments[0].comment.id.clone();

        let result = store
            .add_reply(&b.id, &comment_id, NewReply::new("Bo", "wrong pizza"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_reply() {
        let store = InMemoryStore::new();
        let p = store.create_pizza(pizza("A")).await.unwrap();
        let p = store
            .add_comment(&p.id, NewComment::new("Ann", "hi"))
            .await
            .unwrap()
            .unwrap();
        let comment_id = p.comments[0].comment.id.clone();

        let result = store.remove_reply(&p.id, &comment_id, "nope").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creates() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];

        for batch in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    store
                        .create_pizza(pizza(&format!("batch-{}-{}", batch, i)))
                        .await
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
