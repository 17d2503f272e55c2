use serde::{Deserialize, Serialize};
use url::Url;

/// Base used to derive a browser URL for a task id
pub const TASK_URL_BASE: &str = "https://app.todoist.com/app/task/";

/// Snapshot of an active task as the matcher and presenters see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
  pub id: String,
  pub content: String,
  pub description: String,
  pub url: String,
}

impl RemoteTask {
  pub fn new(id: impl Into<String>, content: impl Into<String>, description: impl Into<String>) -> Self {
    let id = id.into();
    let url = task_url(TASK_URL_BASE, &id);
    Self {
      id,
      content: content.into(),
      description: description.into(),
      url,
    }
  }

  /// Text the matcher searches: content and description on separate lines
  pub fn haystack(&self) -> String {
    format!("{}\n{}", self.content, self.description)
  }
}

/// Build the browser URL for a task, percent-encoding the id as a path segment.
/// An empty id has no URL.
pub fn task_url(base: &str, id: &str) -> String {
  if id.is_empty() {
    return String::new();
  }

  let Ok(mut url) = Url::parse(base) else {
    return String::new();
  };

  if let Ok(mut segments) = url.path_segments_mut() {
    segments.pop_if_empty().push(id);
  }

  url.to_string()
}

/// Payload for creating a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
  pub content: String,
  pub description: String,
}

/// One page of the task list endpoint
#[derive(Debug, Clone, Default)]
pub struct TaskPage {
  pub tasks: Vec<RemoteTask>,
  /// Opaque cursor for the next page; `None` when this was the last page
  pub next_cursor: Option<String>,
}
