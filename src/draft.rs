//! Title, body and prefilled URL for a new task built from an issue.

use serde::Serialize;
use url::Url;

pub const TASK_PREFIX: &str = "[Nightwatch]";
pub const TASK_TITLE_MAX_CHARS: usize = 120;
pub const DEFAULT_ADD_URL: &str = "https://todoist.com/add";

const ELLIPSIS: &str = "...";
const STACK_SNIPPET_MAX_LINES: usize = 8;
const STACK_SNIPPET_MAX_CHARS: usize = 1200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
  Exception,
  #[default]
  Issue,
}

impl IssueKind {
  pub fn label(self) -> &'static str {
    match self {
      IssueKind::Exception => "Exception",
      IssueKind::Issue => "Issue",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      IssueKind::Exception => "exception",
      IssueKind::Issue => "issue",
    }
  }
}

/// Everything known about the issue on the current page.
/// Empty strings mean "not found on the page".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueRecord {
  pub issue_id: String,
  pub kind: IssueKind,
  pub url: String,
  pub title: String,
  pub route: String,
  pub request_url: String,
  pub environment: String,
  pub first_seen: String,
  pub last_seen: String,
  pub severity: String,
  pub occurrences: String,
  pub method: String,
  pub stack_snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
  pub title: String,
  pub body: String,
  /// Tracker "add task" page with title and body filled in
  pub prefilled_url: String,
}

/// Collapse whitespace runs into single spaces and trim
pub fn normalize_whitespace(value: &str) -> String {
  value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max_chars` characters, ending with "..." if truncated
pub fn truncate_text(value: &str, max_chars: usize) -> String {
  let normalized = normalize_whitespace(value);
  if normalized.chars().count() <= max_chars {
    return normalized;
  }

  if max_chars <= ELLIPSIS.len() {
    return normalized.chars().take(max_chars).collect();
  }

  let kept: String = normalized
    .chars()
    .take(max_chars - ELLIPSIS.len())
    .collect();
  format!("{}{}", kept.trim_end(), ELLIPSIS)
}

/// Join `head` and `suffix`, shortening only the suffix to fit `max_chars`.
/// With no room left for suffix text, a bare ellipsis marks the cut when it
/// fits. The head is returned whole even when it alone exceeds the limit.
fn compose_title(head: &str, suffix: &str, max_chars: usize) -> String {
  let head = normalize_whitespace(head);
  let suffix = normalize_whitespace(suffix);
  let full = format!("{head} {suffix}");
  if full.chars().count() <= max_chars {
    return full;
  }

  let room = max_chars.saturating_sub(head.chars().count() + 1);
  if room < ELLIPSIS.len() {
    return head;
  }
  if room == ELLIPSIS.len() {
    return format!("{head} {ELLIPSIS}");
  }

  format!("{head} {}", truncate_text(&suffix, room))
}

fn bounded_snippet(snippet: &str) -> String {
  let lines: Vec<&str> = snippet
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .take(STACK_SNIPPET_MAX_LINES)
    .collect();
  lines
    .join("\n")
    .chars()
    .take(STACK_SNIPPET_MAX_CHARS)
    .collect()
}

/// Marker embedded first in the title; the matcher finds tasks by it
pub fn issue_marker(issue_id: &str) -> String {
  if issue_id.is_empty() {
    "[NW:unknown]".to_string()
  } else {
    format!("[NW:{issue_id}]")
  }
}

/// Build the draft for `issue`. `add_url` is the tracker's add-task page.
pub fn build_draft(issue: &IssueRecord, add_url: &str) -> Draft {
  let head = format!("{TASK_PREFIX} {}", issue_marker(&issue.issue_id));
  let mut suffix = format!("{}: {}", issue.kind.label(), issue.title);
  if !issue.environment.is_empty() {
    suffix.push_str(&format!(" ({})", issue.environment));
  }
  let title = compose_title(&head, &suffix, TASK_TITLE_MAX_CHARS);

  let optional = [
    ("Environment", &issue.environment),
    ("Severity", &issue.severity),
    ("Method", &issue.method),
    ("Route", &issue.route),
    ("Request URL", &issue.request_url),
    ("First seen", &issue.first_seen),
    ("Last seen", &issue.last_seen),
    ("Occurrences", &issue.occurrences),
  ];

  let mut lines = vec![
    format!("Nightwatch Key: issue:{}", issue.issue_id),
    "Source: Laravel Nightwatch".to_string(),
    format!("Issue Type: {}", issue.kind.as_str()),
    format!("Issue ID: {}", issue.issue_id),
    format!("Title: {}", issue.title),
  ];
  lines.extend(
    optional
      .iter()
      .filter(|(_, value)| !value.is_empty())
      .map(|(label, value)| format!("{label}: {value}")),
  );
  lines.push(format!("Nightwatch Page: {}", issue.url));

  let snippet = bounded_snippet(&issue.stack_snippet);
  if !snippet.is_empty() {
    lines.push(String::new());
    lines.push("Stack snippet:".to_string());
    lines.push(snippet);
  }

  let body = lines.join("\n");
  let prefilled_url = prefilled_url(add_url, &title, &body);

  Draft {
    title,
    body,
    prefilled_url,
  }
}

fn prefilled_url(add_url: &str, title: &str, body: &str) -> String {
  match Url::parse(add_url) {
    Ok(mut url) => {
      url
        .query_pairs_mut()
        .append_pair("content", title)
        .append_pair("description", body);
      url.to_string()
    }
    Err(_) => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn issue(id: &str, title: &str) -> IssueRecord {
    IssueRecord {
      issue_id: id.to_string(),
      kind: IssueKind::Exception,
      url: format!("https://nightwatch.laravel.com/apps/1/exceptions/{id}"),
      title: title.to_string(),
      ..IssueRecord::default()
    }
  }

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate_text("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate_text("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate_text("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_trims_before_ellipsis() {
    assert_eq!(truncate_text("hello   world", 9), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate_text("ééééééé", 5), "éé...");
  }

  #[test]
  fn test_truncate_tiny_limit() {
    assert_eq!(truncate_text("hello", 2), "he");
  }

  #[test]
  fn test_short_title_unchanged() {
    let draft = build_draft(&issue("42", "Boom"), DEFAULT_ADD_URL);
    assert_eq!(draft.title, "[Nightwatch] [NW:42] Exception: Boom");
  }

  #[test]
  fn test_environment_in_title() {
    let mut record = issue("42", "Boom");
    record.kind = IssueKind::Issue;
    record.environment = "production".to_string();
    let draft = build_draft(&record, DEFAULT_ADD_URL);
    assert_eq!(draft.title, "[Nightwatch] [NW:42] Issue: Boom (production)");
  }

  #[test]
  fn test_long_title_truncated_with_marker_intact() {
    let long = "word ".repeat(60);
    let draft = build_draft(&issue("01HZX8ABC", &long), DEFAULT_ADD_URL);

    assert_eq!(draft.title.chars().count(), TASK_TITLE_MAX_CHARS);
    assert!(draft.title.starts_with("[Nightwatch] [NW:01HZX8ABC] Exception: word"));
    assert!(draft.title.ends_with("..."));
  }

  #[test]
  fn test_oversized_id_keeps_whole_marker() {
    let id = "x".repeat(150);
    let draft = build_draft(&issue(&id, "Boom"), DEFAULT_ADD_URL);
    assert_eq!(draft.title, format!("[Nightwatch] [NW:{id}]"));
  }

  #[test]
  fn test_suffix_without_room_leaves_ellipsis() {
    assert_eq!(compose_title("head", "long suffix", 8), "head ...");
    assert_eq!(compose_title("head", "long suffix", 9), "head l...");
    assert_eq!(compose_title("head", "long suffix", 6), "head");
  }

  #[test]
  fn test_near_limit_id_marks_dropped_suffix() {
    let id = "x".repeat(98);
    let draft = build_draft(&issue(&id, "Boom"), DEFAULT_ADD_URL);
    assert_eq!(draft.title, format!("[Nightwatch] [NW:{id}] ..."));
    assert_eq!(draft.title.chars().count(), TASK_TITLE_MAX_CHARS);
  }

  #[test]
  fn test_missing_id_uses_unknown_marker() {
    let draft = build_draft(&issue("", "Boom"), DEFAULT_ADD_URL);
    assert!(draft.title.starts_with("[Nightwatch] [NW:unknown]"));
  }

  #[test]
  fn test_body_lists_only_present_fields_in_order() {
    let mut record = issue("42", "Boom");
    record.environment = "staging".to_string();
    record.route = "/checkout".to_string();
    record.occurrences = "17".to_string();

    let draft = build_draft(&record, DEFAULT_ADD_URL);
    assert_eq!(
      draft.body,
      "Nightwatch Key: issue:42\n\
       Source: Laravel Nightwatch\n\
       Issue Type: exception\n\
       Issue ID: 42\n\
       Title: Boom\n\
       Environment: staging\n\
       Route: /checkout\n\
       Occurrences: 17\n\
       Nightwatch Page: https://nightwatch.laravel.com/apps/1/exceptions/42"
    );
  }

  #[test]
  fn test_stack_snippet_is_bounded() {
    let mut record = issue("42", "Boom");
    record.stack_snippet = (0..20)
      .map(|i| format!("  #{i} /app/Foo.php(10)  "))
      .collect::<Vec<_>>()
      .join("\n");

    let draft = build_draft(&record, DEFAULT_ADD_URL);
    let (_, snippet) = draft.body.split_once("\n\nStack snippet:\n").unwrap();
    assert_eq!(snippet.lines().count(), 8);
    assert!(snippet.starts_with("#0 /app/Foo.php(10)"));
  }

  #[test]
  fn test_prefilled_url_carries_title_and_body() {
    let draft = build_draft(&issue("42", "Boom & bust"), DEFAULT_ADD_URL);
    let url = Url::parse(&draft.prefilled_url).unwrap();
    let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

    assert_eq!(url.path(), "/add");
    assert_eq!(pairs["content"], draft.title);
    assert_eq!(pairs["description"], draft.body);
  }

  #[test]
  fn test_deterministic() {
    let record = issue("42", "Boom");
    assert_eq!(
      build_draft(&record, DEFAULT_ADD_URL),
      build_draft(&record, DEFAULT_ADD_URL)
    );
  }
}
