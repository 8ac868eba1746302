use async_trait::async_trait;
use aws_sdk_dynamodb::types::error::InternalServerError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::store::{StoreError, TodoStore};
use crate::todo::{Revision, Todo};

/// In-process store with the same semantics as the DynamoDB table.
#[derive(Default)]
pub(crate) struct MemoryStore {
    todos: RwLock<HashMap<String, Todo>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Number of put/update/delete calls that reached the store.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Todo>, StoreError> {
        Ok(self.todos.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Todo>, StoreError> {
        Ok(self.todos.read().await.get(id).cloned())
    }

    async fn put(&self, todo: &Todo) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.todos
            .write()
            .await
            .insert(todo.id.clone(), todo.clone());
        Ok(())
    }

    async fn update(&self, id: &str, revision: &Revision) -> Result<Option<Todo>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut todos = self.todos.write().await;
        let Some(todo) = todos.get_mut(id) else {
            return Ok(None);
        };
        todo.title = revision.title.clone();
        todo.completed = revision.completed;
        todo.updated_at = revision.updated_at.clone();
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.todos.write().await.remove(id);
        Ok(())
    }
}

/// Error returned when the table cannot be reached.
pub(crate) fn outage() -> StoreError {
    StoreError::Dynamo(aws_sdk_dynamodb::Error::InternalServerError(
        InternalServerError::builder()
            .message("store unavailable")
            .build(),
    ))
}

/// Fails every call with [`outage`].
pub(crate) struct BrokenStore;

#[async_trait]
impl TodoStore for BrokenStore {
    async fn list_all(&self) -> Result<Vec<Todo>, StoreError> {
        Err(outage())
    }

    async fn get(&self, _id: &str) -> Result<Option<Todo>, StoreError> {
        Err(outage())
    }

    async fn put(&self, _todo: &Todo) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn update(&self, _id: &str, _revision: &Revision) -> Result<Option<Todo>, StoreError> {
        Err(outage())
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(outage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(title: &str) -> Revision {
        Revision {
            title: title.to_string(),
            completed: true,
            updated_at: "2024-01-01T00:00:01.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn update_on_missing_record_writes_nothing() {
        let store = MemoryStore::default();
        assert!(store.update("ghost", &revision("x")).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::default();
        store.delete("ghost").await.unwrap();
        store.delete("ghost").await.unwrap();
        assert_eq!(store.writes(), 2);
    }
}
