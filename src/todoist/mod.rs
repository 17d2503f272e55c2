pub mod api_types;
pub mod client;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod store;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;

use crate::credentials::Credential;
use error::TrackerError;
use types::{NewTask, RemoteTask, TaskPage};

/// Remote operations the store needs from a task tracker.
#[async_trait]
pub trait TaskTracker: Send + Sync {
  /// Fetch one page of active tasks, starting at `cursor` (first page when `None`).
  async fn list_tasks_page(
    &self,
    credential: &Credential,
    cursor: Option<&str>,
    limit: usize,
  ) -> Result<TaskPage, TrackerError>;

  /// Create a task. Not idempotent.
  async fn create_task(
    &self,
    credential: &Credential,
    task: &NewTask,
  ) -> Result<RemoteTask, TrackerError>;

  /// Cheapest authenticated call, used to validate a credential.
  async fn check_credential(&self, credential: &Credential) -> Result<(), TrackerError>;
}

#[async_trait]
impl<T: TaskTracker + ?Sized> TaskTracker for Arc<T> {
  async fn list_tasks_page(
    &self,
    credential: &Credential,
    cursor: Option<&str>,
    limit: usize,
  ) -> Result<TaskPage, TrackerError> {
    (**self).list_tasks_page(credential, cursor, limit).await
  }

  async fn create_task(
    &self,
    credential: &Credential,
    task: &NewTask,
  ) -> Result<RemoteTask, TrackerError> {
    (**self).create_task(credential, task).await
  }

  async fn check_credential(&self, credential: &Credential) -> Result<(), TrackerError> {
    (**self).check_credential(credential).await
  }
}
