//! Background service: owns the credential and the remote task cache and
//! answers channel requests from page clients.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{Envelope, IssueHint, Request, Response};
use crate::credentials::CredentialStore;
use crate::matcher::{match_issues, MatchResult};
use crate::todoist::error::{StoreError, TrackerError};
use crate::todoist::store::RemoteTaskStore;
use crate::todoist::TaskTracker;

const MISSING_TOKEN: &str = "No Todoist token is saved.";
const MISSING_CONTENT: &str = "Task content is required.";

#[derive(Debug, Error)]
enum ServiceError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Tracker(#[from] TrackerError),
}

/// Render an error with its source chain, e.g. "failed to create task: ... (500)"
fn error_chain(err: &dyn StdError) -> String {
  let mut message = err.to_string();
  let mut source = err.source();
  while let Some(cause) = source {
    message.push_str(": ");
    message.push_str(&cause.to_string());
    source = cause.source();
  }
  message
}

pub struct BackgroundService<T: TaskTracker> {
  credentials: CredentialStore,
  store: RemoteTaskStore<T>,
}

impl<T: TaskTracker + 'static> BackgroundService<T> {
  pub fn new(credentials: CredentialStore, store: RemoteTaskStore<T>) -> Self {
    Self { credentials, store }
  }

  /// Answer one request. Failures become `ok: false` responses, never errors.
  pub async fn handle(&self, request: Request) -> Response {
    let kind = request.kind();
    debug!(request = kind, "handling request");

    match self.dispatch(request).await {
      Ok(response) => response,
      Err(err) => {
        let message = error_chain(&err);
        warn!(request = kind, error = %message, "request failed");
        Response::failure(self.credentials.current().is_some(), message)
      }
    }
  }

  async fn dispatch(&self, request: Request) -> Result<Response, ServiceError> {
    let credential = self.credentials.current();

    match request {
      Request::GetSettings => Ok(Response::configured(credential.is_some())),

      Request::FindMatches {
        issue_ids,
        issue_hints,
      } => {
        let Some(credential) = credential else {
          return Ok(Response::matches(false, MatchResult::new()));
        };

        let issue_ids: Vec<String> = issue_ids
          .iter()
          .map(|id| id.trim())
          .filter(|id| !id.is_empty())
          .map(String::from)
          .collect();
        if issue_ids.is_empty() {
          return Ok(Response::matches(true, MatchResult::new()));
        }

        let hints: HashMap<String, String> = issue_hints
          .into_iter()
          .map(|(id, IssueHint { title })| (id.trim().to_string(), title))
          .collect();

        let tasks = self.store.fetch_active_tasks(&credential).await?;
        Ok(Response::matches(true, match_issues(&tasks, &issue_ids, &hints)))
      }

      Request::TestCredential => {
        let Some(credential) = credential else {
          return Ok(Response::failure(false, MISSING_TOKEN));
        };
        self.store.tracker().check_credential(&credential).await?;
        Ok(Response::configured(true))
      }

      Request::CreateTask {
        content,
        description,
      } => {
        let Some(credential) = credential else {
          return Ok(Response::failure(false, MISSING_TOKEN));
        };

        let content = content.trim();
        if content.is_empty() {
          return Ok(Response::failure(true, MISSING_CONTENT));
        }

        let task = self
          .store
          .create_task(&credential, content, &description)
          .await?;
        Ok(Response::created(task))
      }
    }
  }

  /// Serve requests from `rx` until every client is dropped.
  /// Each request runs on its own task so a slow fetch does not block the queue.
  pub fn serve(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Envelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
      while let Some(Envelope { request, reply }) = rx.recv().await {
        let service = Arc::clone(&self);
        tokio::spawn(async move {
          let response = service.handle(request).await;
          // The client may have timed out and gone away
          let _ = reply.send(response);
        });
      }
      debug!("all channel clients dropped; background service stopping");
    })
  }

  /// Clear the remote task cache whenever the stored credential changes.
  pub fn watch_credentials(self: &Arc<Self>) -> JoinHandle<()> {
    let mut rx = self.credentials.subscribe();
    let service = Arc::clone(self);
    tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        service.store.invalidate();
        info!(
          configured = rx.borrow().is_some(),
          "credential changed; task cache cleared"
        );
      }
    })
  }
}
