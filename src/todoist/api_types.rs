//! Serde-deserializable types matching Todoist API responses.
//!
//! These types are separate from domain types to allow lenient deserialization
//! while keeping domain types focused on what the matcher needs.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use super::types::{task_url, RemoteTask, TaskPage};

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTask {
  #[serde(default, deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default, deserialize_with = "null_as_empty")]
  pub content: String,
  #[serde(default, deserialize_with = "null_as_empty")]
  pub description: String,
}

impl ApiTask {
  pub fn into_remote(self, task_url_base: &str) -> RemoteTask {
    let url = task_url(task_url_base, &self.id);
    RemoteTask {
      id: self.id,
      content: self.content,
      description: self.description,
      url,
    }
  }
}

/// Ids are strings in API v1 but numeric in older payloads.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(match value {
    Value::String(s) => s,
    Value::Number(n) => n.to_string(),
    _ => String::new(),
  })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// List endpoint response
// ============================================================================

/// The list endpoint returns either a paginated envelope or a bare array.
/// Items are decoded one by one so a malformed task does not drop its page.
/// Anything else is treated as an empty final page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiListResponse {
  Page {
    results: Vec<Value>,
    #[serde(default, deserialize_with = "string_or_none")]
    next_cursor: Option<String>,
  },
  Bare(Vec<Value>),
  Other(Value),
}

/// Cursors other than strings end pagination.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::String(s) => Some(s),
    _ => None,
  })
}

impl ApiListResponse {
  pub fn into_page(self, task_url_base: &str) -> TaskPage {
    let (results, next_cursor) = match self {
      Self::Page {
        results,
        next_cursor,
      } => (results, next_cursor.filter(|c| !c.is_empty())),
      Self::Bare(results) => (results, None),
      Self::Other(value) => {
        let body = super::error::truncate_details(&value.to_string());
        warn!(%body, "unrecognised task list response; treating as empty");
        (Vec::new(), None)
      }
    };

    let tasks = results
      .into_iter()
      .filter_map(|item| match serde_json::from_value::<ApiTask>(item) {
        Ok(task) => Some(task.into_remote(task_url_base)),
        Err(err) => {
          warn!(%err, "skipping malformed task");
          None
        }
      })
      .collect();

    TaskPage { tasks, next_cursor }
  }
}
