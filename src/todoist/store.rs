//! Shared, credential-keyed cache of active remote tasks.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TodoistConfig;
use crate::credentials::Credential;

use super::error::StoreError;
use super::types::{NewTask, RemoteTask};
use super::TaskTracker;

/// Pagination and freshness limits for the store
#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
  pub ttl: Duration,
  pub page_size: usize,
  pub max_pages: usize,
}

impl From<&TodoistConfig> for StoreSettings {
  fn from(config: &TodoistConfig) -> Self {
    Self {
      ttl: Duration::from_secs(config.task_cache_ttl_secs),
      page_size: config.page_size,
      max_pages: config.max_pages,
    }
  }
}

impl Default for StoreSettings {
  fn default() -> Self {
    Self::from(&TodoistConfig::default())
  }
}

struct CachedTasks {
  credential: Credential,
  fetched_at: Instant,
  tasks: Vec<RemoteTask>,
}

#[derive(Default)]
struct CacheState {
  entry: Option<CachedTasks>,
  /// Bumped by every invalidation so an overlapping refresh does not resurrect stale data
  epoch: u64,
}

/// Remote task store with a single TTL cache entry.
///
/// Refreshes are single-flight: callers that find the cache stale while a
/// refresh is running wait for it and then read its result.
pub struct RemoteTaskStore<T: TaskTracker> {
  tracker: T,
  settings: StoreSettings,
  state: Mutex<CacheState>,
  refresh_gate: tokio::sync::Mutex<()>,
}

impl<T: TaskTracker> RemoteTaskStore<T> {
  pub fn new(tracker: T, settings: StoreSettings) -> Self {
    Self {
      tracker,
      settings,
      state: Mutex::new(CacheState::default()),
      refresh_gate: tokio::sync::Mutex::new(()),
    }
  }

  pub fn tracker(&self) -> &T {
    &self.tracker
  }

  fn lock_state(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn cached(&self, credential: &Credential) -> Option<Vec<RemoteTask>> {
    let state = self.lock_state();
    state
      .entry
      .as_ref()
      .filter(|entry| entry.credential == *credential)
      .filter(|entry| entry.fetched_at.elapsed() < self.settings.ttl)
      .map(|entry| entry.tasks.clone())
  }

  /// All active tasks for `credential`, served from cache while it is fresh.
  ///
  /// A failed page aborts the whole fetch and leaves the cache as it was.
  pub async fn fetch_active_tasks(
    &self,
    credential: &Credential,
  ) -> Result<Vec<RemoteTask>, StoreError> {
    if let Some(tasks) = self.cached(credential) {
      debug!(tasks = tasks.len(), "task cache hit");
      return Ok(tasks);
    }

    let _gate = self.refresh_gate.lock().await;

    // Another caller may have refreshed while we waited on the gate
    if let Some(tasks) = self.cached(credential) {
      debug!(tasks = tasks.len(), "task cache filled by concurrent refresh");
      return Ok(tasks);
    }

    let epoch = self.lock_state().epoch;
    let started_at = Instant::now();
    let tasks = self.fetch_all_pages(credential).await?;

    let mut state = self.lock_state();
    if state.epoch == epoch {
      state.entry = Some(CachedTasks {
        credential: credential.clone(),
        fetched_at: started_at,
        tasks: tasks.clone(),
      });
    } else {
      debug!("task cache invalidated during refresh; result not cached");
    }

    info!(
      tasks = tasks.len(),
      credential = %credential.fingerprint(),
      "fetched active tasks"
    );
    Ok(tasks)
  }

  async fn fetch_all_pages(&self, credential: &Credential) -> Result<Vec<RemoteTask>, StoreError> {
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;

    for page in 1..=self.settings.max_pages {
      let result = self
        .tracker
        .list_tasks_page(credential, cursor.as_deref(), self.settings.page_size)
        .await
        .map_err(|source| StoreError::RemoteFetch { page, source })?;

      collected.extend(result.tasks);

      match result.next_cursor {
        Some(next) => cursor = Some(next),
        None => return Ok(collected),
      }
    }

    warn!(
      max_pages = self.settings.max_pages,
      tasks = collected.len(),
      "page cap reached with more pages available"
    );
    Ok(collected)
  }

  /// Drop the cached listing unconditionally.
  pub fn invalidate(&self) {
    let mut state = self.lock_state();
    state.entry = None;
    state.epoch += 1;
  }

  /// Create a task; on success the cache is invalidated so the next listing sees it.
  pub async fn create_task(
    &self,
    credential: &Credential,
    content: &str,
    description: &str,
  ) -> Result<RemoteTask, StoreError> {
    let new_task = NewTask {
      content: content.to_string(),
      description: description.to_string(),
    };

    let task = self
      .tracker
      .create_task(credential, &new_task)
      .await
      .map_err(StoreError::RemoteCreate)?;

    self.invalidate();
    info!(task_id = %task.id, "created task");
    Ok(task)
  }
}
