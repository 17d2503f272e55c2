use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::matcher::MatchResult;
use crate::todoist::types::RemoteTask;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueHint {
  pub title: String,
}

/// Requests from the page client to the background service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
  GetSettings,
  #[serde(rename_all = "camelCase")]
  FindMatches {
    issue_ids: Vec<String>,
    #[serde(default)]
    issue_hints: HashMap<String, IssueHint>,
  },
  TestCredential,
  CreateTask {
    content: String,
    #[serde(default)]
    description: String,
  },
}

impl Request {
  pub fn kind(&self) -> &'static str {
    match self {
      Request::GetSettings => "getSettings",
      Request::FindMatches { .. } => "findMatches",
      Request::TestCredential => "testCredential",
      Request::CreateTask { .. } => "createTask",
    }
  }
}

/// Reply from the background service. `ok: false` carries `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub ok: bool,
  #[serde(default)]
  pub configured: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matches: Option<MatchResult>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task: Option<RemoteTask>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl Response {
  pub fn configured(configured: bool) -> Self {
    Self {
      ok: true,
      configured,
      ..Self::default()
    }
  }

  pub fn matches(configured: bool, matches: MatchResult) -> Self {
    Self {
      ok: true,
      configured,
      matches: Some(matches),
      ..Self::default()
    }
  }

  pub fn created(task: RemoteTask) -> Self {
    Self {
      ok: true,
      configured: true,
      task: Some(task),
      ..Self::default()
    }
  }

  pub fn failure(configured: bool, error: impl Into<String>) -> Self {
    Self {
      ok: false,
      configured,
      error: Some(error.into()),
      ..Self::default()
    }
  }
}
