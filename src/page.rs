//! Issue context extracted from a page snapshot.
//!
//! A snapshot is the already-scraped content of one monitored page: its URL,
//! headings, labeled fields, code blocks and links. This module turns it into
//! the current [`IssueRecord`] and the sibling issues listed on the page.

use color_eyre::{eyre::WrapErr, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use url::Url;

use crate::draft::{normalize_whitespace, IssueKind, IssueRecord};
use crate::matcher::PRODUCT_SIGNAL;

static ISSUE_PATH: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)/(exceptions?|issues?)/([^/?#]+)").expect("valid regex"));
static COLLECTION_PATH: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)/(?:exceptions?|issues?)(?:/|$)").expect("valid regex"));
static PREFERRED_HEADING: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)exception|issue|error|fatal|stack").expect("valid regex"));
static STACK_SIGNAL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)exception|stack|#\d+| at ").expect("valid regex"));

const STACK_MIN_CHARS: usize = 50;
const STACK_MAX_LINES: usize = 8;
const STACK_MAX_CHARS: usize = 1200;
const ROUTE_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabeledField {
  pub label: String,
  pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Link {
  pub href: String,
  #[serde(default)]
  pub text: String,
}

/// Scraped content of one page, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
  pub url: String,
  pub document_title: String,
  pub application_name: Option<String>,
  pub headings: Vec<String>,
  pub fields: Vec<LabeledField>,
  pub code_blocks: Vec<String>,
  pub links: Vec<Link>,
}

/// An issue id found on the page and the text it was shown with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
  pub issue_id: String,
  pub title_hint: Option<String>,
}

/// What the scheduler needs from the page for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
  /// False when the page is not part of the monitored app; nothing is shown then
  pub monitored: bool,
  pub current: Option<IssueRecord>,
  pub siblings: Vec<IssueRef>,
}

/// Issue location parsed from a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueLocation {
  pub issue_id: String,
  pub kind: IssueKind,
  pub url: String,
}

/// Synchronous access to the current page
pub trait PageSource: Send + Sync {
  fn context(&self) -> PageContext;
}

/// Latest snapshot shared between the file watcher and the scheduler
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
  inner: Arc<RwLock<Option<PageSnapshot>>>,
}

impl SharedSnapshot {
  pub fn replace(&self, snapshot: PageSnapshot) {
    *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
  }

  pub fn get(&self) -> Option<PageSnapshot> {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl PageSource for SharedSnapshot {
  fn context(&self) -> PageContext {
    self.get().map(|s| s.context()).unwrap_or_default()
  }
}

/// Resolve `href` against `base` and pull the issue id out of its path.
pub fn parse_issue_reference(href: &str, base: Option<&Url>) -> Option<IssueLocation> {
  let url = match base {
    Some(base) => base.join(href).ok()?,
    None => Url::parse(href).ok()?,
  };

  let captures = ISSUE_PATH.captures(url.path())?;
  let raw_id = captures.get(2)?.as_str();
  let issue_id = urlencoding::decode(raw_id).ok()?.trim().to_string();
  if issue_id.is_empty() {
    return None;
  }

  let kind = if captures.get(1)?.as_str().to_lowercase().starts_with("exception") {
    IssueKind::Exception
  } else {
    IssueKind::Issue
  };

  Some(IssueLocation {
    issue_id,
    kind,
    url: url.to_string(),
  })
}

fn is_list_like_path(path: &str) -> bool {
  COLLECTION_PATH.is_match(path) && !ISSUE_PATH.is_match(path)
}

impl PageSnapshot {
  /// Read a JSON snapshot from disk.
  pub async fn load(path: &Path) -> Result<Self> {
    let raw = tokio::fs::read_to_string(path)
      .await
      .wrap_err_with(|| format!("failed to read page snapshot {}", path.display()))?;
    serde_json::from_str(&raw)
      .wrap_err_with(|| format!("failed to parse page snapshot {}", path.display()))
  }

  fn parsed_url(&self) -> Option<Url> {
    Url::parse(&self.url).ok()
  }

  pub fn is_monitored(&self) -> bool {
    let (host, path) = self
      .parsed_url()
      .map(|url| (url.host_str().unwrap_or_default().to_string(), url.path().to_string()))
      .unwrap_or_default();
    let signal = format!("{host} {path} {}", self.document_title).to_lowercase();
    if signal.contains(PRODUCT_SIGNAL) {
      return true;
    }

    self
      .application_name
      .as_deref()
      .is_some_and(|name| name.to_lowercase().contains(PRODUCT_SIGNAL))
  }

  /// First labeled field whose label contains any alias, in page order
  pub fn labeled_value(&self, aliases: &[&str]) -> String {
    self
      .fields
      .iter()
      .find_map(|field| {
        let label = normalize_whitespace(&field.label);
        let label = label.trim_end_matches(':').to_lowercase();
        let value = normalize_whitespace(&field.value);
        let wanted = !label.is_empty() && aliases.iter().any(|alias| label.contains(alias));
        (wanted && !value.is_empty() && value.to_lowercase() != label).then_some(value)
      })
      .unwrap_or_default()
  }

  /// A URL or absolute path shown in a link or code block
  fn route_from_page(&self) -> String {
    self
      .links
      .iter()
      .map(|link| link.text.as_str())
      .chain(self.code_blocks.iter().map(String::as_str))
      .map(normalize_whitespace)
      .find(|text| {
        let lower = text.to_lowercase();
        let is_url = (lower.starts_with("http://") || lower.starts_with("https://"))
          && !text.contains(' ');
        let is_path = text.starts_with('/')
          && text.len() > 1
          && !text.contains(' ')
          && text.chars().count() < ROUTE_MAX_CHARS;
        is_url || is_path
      })
      .unwrap_or_default()
  }

  fn best_title(&self, issue_id: &str) -> String {
    let headings: Vec<String> = self
      .headings
      .iter()
      .map(|h| normalize_whitespace(h))
      .filter(|h| h.chars().count() > 3)
      .collect();

    if let Some(heading) = headings
      .iter()
      .find(|h| PREFERRED_HEADING.is_match(h))
      .or_else(|| headings.first())
    {
      return heading.clone();
    }

    let from_document = normalize_whitespace(&self.document_title)
      .split('|')
      .next()
      .unwrap_or_default()
      .trim()
      .to_string();
    if !from_document.is_empty() {
      return from_document;
    }

    format!("Issue {issue_id}")
  }

  fn stack_snippet(&self) -> String {
    for block in &self.code_blocks {
      let raw = block.replace('\r', "");
      if raw.chars().count() < STACK_MIN_CHARS {
        continue;
      }

      let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
      if lines.len() < 2 || !STACK_SIGNAL.is_match(&lines.join("\n")) {
        continue;
      }

      return lines
        .iter()
        .take(STACK_MAX_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(STACK_MAX_CHARS)
        .collect();
    }

    String::new()
  }

  pub fn current_issue(&self) -> Option<IssueRecord> {
    let location = parse_issue_reference(&self.url, None)?;

    let route = match self.labeled_value(&["route", "path"]) {
      route if route.is_empty() => self.route_from_page(),
      route => route,
    };

    Some(IssueRecord {
      title: self.best_title(&location.issue_id),
      route,
      request_url: self.labeled_value(&["request url", "url"]),
      environment: self.labeled_value(&["environment", "env", "application"]),
      first_seen: self.labeled_value(&["first seen", "occurred at", "timestamp", "created"]),
      last_seen: self.labeled_value(&["last seen", "updated", "updated at"]),
      severity: self.labeled_value(&["severity", "level"]),
      occurrences: self.labeled_value(&["occurrences", "count", "events"]),
      method: self.labeled_value(&["method", "http method", "verb"]),
      stack_snippet: self.stack_snippet(),
      issue_id: location.issue_id,
      kind: location.kind,
      url: location.url,
    })
  }

  /// Issues linked from a list page, one entry per id in page order.
  /// The first non-empty link text for an id becomes its hint.
  pub fn sibling_issues(&self) -> Vec<IssueRef> {
    let Some(base) = self.parsed_url() else {
      return Vec::new();
    };
    if !is_list_like_path(base.path()) {
      return Vec::new();
    }

    let mut siblings: Vec<IssueRef> = Vec::new();
    for link in &self.links {
      let Some(location) = parse_issue_reference(&link.href, Some(&base)) else {
        continue;
      };
      let hint = normalize_whitespace(&link.text);
      let hint = (!hint.is_empty()).then_some(hint);

      match siblings.iter_mut().find(|s| s.issue_id == location.issue_id) {
        Some(existing) => {
          if existing.title_hint.is_none() {
            existing.title_hint = hint;
          }
        }
        None => siblings.push(IssueRef {
          issue_id: location.issue_id,
          title_hint: hint,
        }),
      }
    }
    siblings
  }

  pub fn context(&self) -> PageContext {
    if !self.is_monitored() {
      return PageContext::default();
    }

    PageContext {
      monitored: true,
      current: self.current_issue(),
      siblings: self.sibling_issues(),
    }
  }
}
