use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::TodoistConfig;
use crate::credentials::Credential;
use crate::todoist::api_types::{ApiListResponse, ApiTask};
use crate::todoist::error::{truncate_details, TrackerError};
use crate::todoist::types::{NewTask, RemoteTask, TaskPage};
use crate::todoist::TaskTracker;

/// Todoist REST API v1 client
#[derive(Clone)]
pub struct TodoistClient {
  http: reqwest::Client,
  api_base: String,
  task_url_base: String,
}

impl TodoistClient {
  pub fn new(config: &TodoistConfig) -> Result<Self, TrackerError> {
    let http = reqwest::Client::builder()
      .user_agent(concat!("nwtask/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()?;

    Ok(Self {
      http,
      api_base: config.api_base.trim_end_matches('/').to_string(),
      task_url_base: config.task_url_base.clone(),
    })
  }

  /// Build an endpoint URL, skipping empty query values
  fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, TrackerError> {
    let mut url = Url::parse(&format!("{}{}", self.api_base, path))?;
    let pairs: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
    if !pairs.is_empty() {
      let mut serializer = url.query_pairs_mut();
      for (key, value) in pairs {
        serializer.append_pair(key, value);
      }
    }
    Ok(url)
  }

  async fn get_text(
    &self,
    path: &str,
    credential: &Credential,
    query: &[(&str, String)],
  ) -> Result<String, TrackerError> {
    let url = self.endpoint(path, query)?;
    debug!(%url, "GET");

    let response = self
      .http
      .get(url)
      .bearer_auth(credential.expose())
      .send()
      .await?;

    let response = check_status(response, "request").await?;
    Ok(response.text().await?)
  }
}

/// Map non-2xx responses to errors, keeping a bounded slice of the body.
async fn check_status(response: Response, operation: &'static str) -> Result<Response, TrackerError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  if status == StatusCode::GONE {
    return Err(TrackerError::DeprecatedEndpoint);
  }

  // A body we cannot read is reported as empty details
  let details = response.text().await.unwrap_or_default();
  Err(TrackerError::Status {
    operation,
    status: status.as_u16(),
    details: truncate_details(&details),
  })
}

#[async_trait]
impl TaskTracker for TodoistClient {
  async fn list_tasks_page(
    &self,
    credential: &Credential,
    cursor: Option<&str>,
    limit: usize,
  ) -> Result<TaskPage, TrackerError> {
    let query = [
      ("limit", limit.to_string()),
      ("cursor", cursor.unwrap_or_default().to_string()),
    ];
    let body = self.get_text("/tasks", credential, &query).await?;
    let response: ApiListResponse = serde_json::from_str(&body)?;
    Ok(response.into_page(&self.task_url_base))
  }

  async fn create_task(
    &self,
    credential: &Credential,
    task: &NewTask,
  ) -> Result<RemoteTask, TrackerError> {
    let url = self.endpoint("/tasks", &[])?;
    debug!(%url, "POST");

    let response = self
      .http
      .post(url)
      .bearer_auth(credential.expose())
      .json(task)
      .send()
      .await?;

    let response = check_status(response, "create").await?;
    let body = response.text().await?;
    let created: ApiTask = serde_json::from_str(&body)?;
    Ok(created.into_remote(&self.task_url_base))
  }

  async fn check_credential(&self, credential: &Credential) -> Result<(), TrackerError> {
    self
      .get_text("/projects", credential, &[("limit", "1".to_string())])
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;
  use serde_json::json;

  fn client_for(server: &MockServer) -> TodoistClient {
    let config = TodoistConfig {
      api_base: server.url("/api/v1"),
      ..TodoistConfig::default()
    };
    TodoistClient::new(&config).unwrap()
  }

  fn credential() -> Credential {
    Credential::parse("token-123").unwrap()
  }

  #[tokio::test]
  async fn test_list_page_sends_bearer_and_limit() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(GET)
          .path("/api/v1/tasks")
          .query_param("limit", "200")
          .header("authorization", "Bearer token-123");
        then.status(200).json_body(json!({
          "results": [{"id": "1", "content": "[NW:42] Boom", "description": ""}],
          "next_cursor": "c2"
        }));
      })
      .await;

    let page = client_for(&server)
      .list_tasks_page(&credential(), None, 200)
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(page.tasks.len(), 1);
    assert_eq!(page.tasks[0].content, "[NW:42] Boom");
    assert_eq!(page.next_cursor.as_deref(), Some("c2"));
  }

  #[tokio::test]
  async fn test_list_page_passes_cursor() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(GET)
          .path("/api/v1/tasks")
          .query_param("cursor", "c2");
        then.status(200).json_body(json!([]));
      })
      .await;

    let page = client_for(&server)
      .list_tasks_page(&credential(), Some("c2"), 200)
      .await
      .unwrap();

    mock.assert_async().await;
    assert!(page.tasks.is_empty());
    assert!(page.next_cursor.is_none());
  }

  #[tokio::test]
  async fn test_gone_maps_to_deprecated_endpoint() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/api/v1/tasks");
        then.status(410).body("gone");
      })
      .await;

    let err = client_for(&server)
      .list_tasks_page(&credential(), None, 200)
      .await
      .unwrap_err();

    assert!(matches!(err, TrackerError::DeprecatedEndpoint));
  }

  #[tokio::test]
  async fn test_error_status_keeps_bounded_details() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/api/v1/tasks");
        then.status(401).body("y".repeat(500));
      })
      .await;

    let err = client_for(&server)
      .list_tasks_page(&credential(), None, 200)
      .await
      .unwrap_err();

    match err {
      TrackerError::Status {
        status, details, ..
      } => {
        assert_eq!(status, 401);
        assert_eq!(details.len(), 300);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn test_create_posts_payload() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path("/api/v1/tasks")
          .header("authorization", "Bearer token-123")
          .json_body(json!({"content": "Fix", "description": "Issue ID: 42"}));
        then
          .status(200)
          .json_body(json!({"id": "99", "content": "Fix", "description": "Issue ID: 42"}));
      })
      .await;

    let task = client_for(&server)
      .create_task(
        &credential(),
        &NewTask {
          content: "Fix".to_string(),
          description: "Issue ID: 42".to_string(),
        },
      )
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(task.id, "99");
    assert_eq!(task.url, "https://app.todoist.com/app/task/99");
  }

  #[tokio::test]
  async fn test_check_credential_requests_one_project() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(GET)
          .path("/api/v1/projects")
          .query_param("limit", "1");
        then.status(200).json_body(json!({"results": []}));
      })
      .await;

    client_for(&server)
      .check_credential(&credential())
      .await
      .unwrap();
    mock.assert_async().await;
  }
}
