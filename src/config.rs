use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::Credential;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub todoist: TodoistConfig,
  pub client: ClientConfig,
}

/// Task tracker connection and the background task cache
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TodoistConfig {
  pub api_base: String,
  /// Browser URL prefix for a task; the task id is appended as a path segment
  pub task_url_base: String,
  /// Page used to prefill a draft when the API cannot be used
  pub add_url: String,
  pub page_size: usize,
  /// Hard cap on pages per listing
  pub max_pages: usize,
  pub task_cache_ttl_secs: u64,
  pub request_timeout_secs: u64,
  /// Token from the config file; environment variables take precedence
  pub token: Option<String>,
}

impl Default for TodoistConfig {
  fn default() -> Self {
    Self {
      api_base: "https://api.todoist.com/api/v1".to_string(),
      task_url_base: crate::todoist::types::TASK_URL_BASE.to_string(),
      add_url: "https://todoist.com/add".to_string(),
      page_size: 200,
      max_pages: 10,
      task_cache_ttl_secs: 90,
      request_timeout_secs: 30,
      token: None,
    }
  }
}

/// Page client timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// Quiet period before a scheduled pass runs
  pub debounce_ms: u64,
  pub match_cache_ttl_secs: u64,
  pub config_cache_ttl_secs: u64,
  /// How often the page snapshot is polled for URL and content changes
  pub url_poll_ms: u64,
  pub request_timeout_ms: u64,
  /// Delay of the second refresh after a task is created
  pub post_create_refresh_ms: u64,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      debounce_ms: 150,
      match_cache_ttl_secs: 20,
      config_cache_ttl_secs: 30,
      url_poll_ms: 500,
      request_timeout_ms: 10_000,
      post_create_refresh_ms: 1200,
    }
  }
}

impl ClientConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn match_cache_ttl(&self) -> Duration {
    Duration::from_secs(self.match_cache_ttl_secs)
  }

  pub fn config_cache_ttl(&self) -> Duration {
    Duration::from_secs(self.config_cache_ttl_secs)
  }

  pub fn url_poll(&self) -> Duration {
    Duration::from_millis(self.url_poll_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }

  pub fn post_create_refresh(&self) -> Duration {
    Duration::from_millis(self.post_create_refresh_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./nwtask.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/nwtask/config.yaml
  ///
  /// Without a file, defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("nwtask.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("nwtask").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not to a mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Resolve the Todoist credential.
  ///
  /// Checks NWTASK_TODOIST_TOKEN, then TODOIST_API_TOKEN, then `todoist.token`.
  /// Blank values count as missing.
  pub fn credential(&self) -> Option<Credential> {
    ["NWTASK_TODOIST_TOKEN", "TODOIST_API_TOKEN"]
      .iter()
      .filter_map(|name| std::env::var(name).ok())
      .find_map(|value| Credential::parse(&value))
      .or_else(|| self.todoist.token.as_deref().and_then(Credential::parse))
  }
}
