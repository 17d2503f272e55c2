//! In-memory tracker for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::credentials::Credential;

use super::error::TrackerError;
use super::types::{NewTask, RemoteTask, TaskPage};
use super::TaskTracker;

/// Serves `pages` one task per page, chaining cursors `p1`, `p2`, ...
#[derive(Default)]
pub struct FakeTracker {
  pub pages: Vec<Vec<RemoteTask>>,
  /// Keep returning a next cursor forever
  pub endless: bool,
  pub fail_on_page: Mutex<Option<usize>>,
  pub fail_create: bool,
  pub delay: Duration,
  pub list_calls: AtomicUsize,
  pub check_calls: AtomicUsize,
  pub cursors_seen: Mutex<Vec<Option<String>>>,
  pub created: Mutex<Vec<NewTask>>,
}

impl FakeTracker {
  pub fn with_pages(count: usize) -> Self {
    let pages = (0..count)
      .map(|i| vec![RemoteTask::new(format!("task-{i}"), format!("Task {i}"), "")])
      .collect();
    Self::with_tasks_in_pages(pages)
  }

  pub fn with_tasks_in_pages(pages: Vec<Vec<RemoteTask>>) -> Self {
    Self {
      pages,
      ..Self::default()
    }
  }

  /// A single page holding all of `tasks`
  pub fn with_tasks(tasks: Vec<RemoteTask>) -> Self {
    Self::with_tasks_in_pages(vec![tasks])
  }

  pub fn endless() -> Self {
    Self {
      endless: true,
      ..Self::default()
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn failing_on_page(self, index: usize) -> Self {
    self.set_fail_on_page(Some(index));
    self
  }

  pub fn failing_create(mut self) -> Self {
    self.fail_create = true;
    self
  }

  pub fn set_fail_on_page(&self, index: Option<usize>) {
    *self.fail_on_page.lock().unwrap() = index;
  }

  /// Number of paginated fetches started (first-page requests)
  pub fn fetches(&self) -> usize {
    self
      .cursors_seen
      .lock()
      .unwrap()
      .iter()
      .filter(|cursor| cursor.is_none())
      .count()
  }

  fn failure() -> TrackerError {
    TrackerError::Status {
      operation: "request",
      status: 500,
      details: "boom".to_string(),
    }
  }
}

#[async_trait]
impl TaskTracker for FakeTracker {
  async fn list_tasks_page(
    &self,
    _credential: &Credential,
    cursor: Option<&str>,
    _limit: usize,
  ) -> Result<TaskPage, TrackerError> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    self
      .cursors_seen
      .lock()
      .unwrap()
      .push(cursor.map(String::from));

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    let index = cursor
      .and_then(|c| c.strip_prefix('p'))
      .and_then(|n| n.parse::<usize>().ok())
      .unwrap_or(0);

    if *self.fail_on_page.lock().unwrap() == Some(index) {
      return Err(Self::failure());
    }

    let tasks = if self.endless {
      vec![RemoteTask::new(format!("endless-{index}"), "", "")]
    } else {
      self.pages.get(index).cloned().unwrap_or_default()
    };

    let has_more = self.endless || index + 1 < self.pages.len();
    Ok(TaskPage {
      tasks,
      next_cursor: has_more.then(|| format!("p{}", index + 1)),
    })
  }

  async fn create_task(
    &self,
    _credential: &Credential,
    task: &NewTask,
  ) -> Result<RemoteTask, TrackerError> {
    if self.fail_create {
      return Err(Self::failure());
    }
    let mut created = self.created.lock().unwrap();
    created.push(task.clone());
    Ok(RemoteTask::new(
      format!("created-{}", created.len()),
      task.content.clone(),
      task.description.clone(),
    ))
  }

  async fn check_credential(&self, _credential: &Credential) -> Result<(), TrackerError> {
    self.check_calls.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}
