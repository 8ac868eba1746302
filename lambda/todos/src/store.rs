use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use thiserror::Error;

use crate::todo::{Revision, Todo};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("dynamodb request failed")]
    Dynamo(#[from] aws_sdk_dynamodb::Error),
    #[error("stored item is missing attribute `{0}`")]
    MissingAttribute(&'static str),
    #[error("stored item attribute `{0}` has the wrong type")]
    InvalidAttribute(&'static str),
}

/// Key-value persistence for todo records, keyed by `id`.
#[async_trait]
pub(crate) trait TodoStore: Send + Sync {
    /// Full scan, store-defined order.
    async fn list_all(&self) -> Result<Vec<Todo>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Todo>, StoreError>;

    async fn put(&self, todo: &Todo) -> Result<(), StoreError>;

    /// Overwrites the mutable fields of an existing record. Returns `None`
    /// when no record exists at `id`; nothing is written in that case.
    async fn update(&self, id: &str, revision: &Revision) -> Result<Option<Todo>, StoreError>;

    /// Succeeds whether or not the key existed.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

type Item = HashMap<String, AttributeValue>;

fn key(id: &str) -> Item {
    let mut key = HashMap::new();
    key.insert("id".to_string(), AttributeValue::S(id.to_string()));
    key
}

fn to_item(todo: &Todo) -> Item {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(todo.id.clone()));
    item.insert("title".to_string(), AttributeValue::S(todo.title.clone()));
    item.insert("completed".to_string(), AttributeValue::Bool(todo.completed));
    item.insert(
        "createdAt".to_string(),
        AttributeValue::S(todo.created_at.clone()),
    );
    item.insert(
        "updatedAt".to_string(),
        AttributeValue::S(todo.updated_at.clone()),
    );
    item
}

fn string_attr(item: &Item, name: &'static str) -> Result<String, StoreError> {
    item.get(name)
        .ok_or(StoreError::MissingAttribute(name))?
        .as_s()
        .map(|s| s.to_string())
        .map_err(|_| StoreError::InvalidAttribute(name))
}

fn from_item(item: &Item) -> Result<Todo, StoreError> {
    let completed = *item
        .get("completed")
        .ok_or(StoreError::MissingAttribute("completed"))?
        .as_bool()
        .map_err(|_| StoreError::InvalidAttribute("completed"))?;

    Ok(Todo {
        id: string_attr(item, "id")?,
        title: string_attr(item, "title")?,
        completed,
        created_at: string_attr(item, "createdAt")?,
        updated_at: string_attr(item, "updatedAt")?,
    })
}

/// DynamoDB-backed store. Holds the process-wide SDK client by reference so
/// every invocation reuses its connection pool.
pub(crate) struct DynamoStore<'a> {
    client: &'a Client,
    table: &'a str,
}

impl<'a> DynamoStore<'a> {
    pub fn new(client: &'a Client, table: &'a str) -> Self {
        Self { client, table }
    }
}

#[async_trait]
impl TodoStore for DynamoStore<'_> {
    async fn list_all(&self) -> Result<Vec<Todo>, StoreError> {
        let mut todos = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let page = self
                .client
                .scan()
                .table_name(self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;

            for item in page.items.unwrap_or_default() {
                todos.push(from_item(&item)?);
            }

            match page.last_evaluated_key {
                Some(last) if !last.is_empty() => start_key = Some(last),
                _ => break,
            }
        }

        Ok(todos)
    }

    async fn get(&self, id: &str) -> Result<Option<Todo>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(self.table)
            .set_key(Some(key(id)))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;

        output.item.as_ref().map(from_item).transpose()
    }

    async fn put(&self, todo: &Todo) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(self.table)
            .set_item(Some(to_item(todo)))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;

        Ok(())
    }

    async fn update(&self, id: &str, revision: &Revision) -> Result<Option<Todo>, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(self.table)
            .set_key(Some(key(id)))
            .update_expression("SET title = :title, completed = :completed, updatedAt = :updatedAt")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":title", AttributeValue::S(revision.title.clone()))
            .expression_attribute_values(":completed", AttributeValue::Bool(revision.completed))
            .expression_attribute_values(
                ":updatedAt",
                AttributeValue::S(revision.updated_at.clone()),
            )
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => match output.attributes {
                Some(item) => from_item(&item).map(Some),
                None => Err(StoreError::MissingAttribute("id")),
            },
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(aws_sdk_dynamodb::Error::from(err).into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(self.table)
            .set_key(Some(key(id)))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;

        Ok(())
    }
}
