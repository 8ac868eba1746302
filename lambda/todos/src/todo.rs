use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Body accepted by create and update. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TodoInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Source of globally unique record identifiers.
pub(crate) trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

pub(crate) struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Wall clock producing ISO-8601 UTC timestamps.
pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> String;
}

pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Applies the record lifecycle rules: server-side ids, timestamps and
/// field defaults.
#[derive(Clone)]
pub(crate) struct Lifecycle {
    ids: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
}

impl Lifecycle {
    pub fn new(ids: Arc<dyn IdSource>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(UuidIds), Arc::new(SystemClock))
    }

    /// Builds a fresh record. Only `title` is taken from the client.
    pub fn create(&self, input: TodoInput) -> Todo {
        let timestamp = self.clock.now();
        Todo {
            id: self.ids.next_id(),
            title: input.title.unwrap_or_default(),
            completed: false,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        }
    }

    /// Fields written by an update. Absent fields overwrite with their
    /// defaults rather than keeping the stored value.
    pub fn revise(&self, input: TodoInput) -> Revision {
        Revision {
            title: input.title.unwrap_or_default(),
            completed: input.completed.unwrap_or(false),
            updated_at: self.clock.now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Revision {
    pub title: String,
    pub completed: bool,
    pub updated_at: String,
}
