//! What a reconciliation pass shows, and a console rendering of it.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::draft::{Draft, IssueRecord, TASK_TITLE_MAX_CHARS};
use crate::todoist::types::RemoteTask;

/// The issue open on the page, its draft and the tasks that already track it
#[derive(Debug, Clone, PartialEq)]
pub struct IssueView {
  pub issue: IssueRecord,
  pub draft: Draft,
  pub matches: Vec<RemoteTask>,
}

/// An issue listed on the page (list badge)
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingView {
  pub issue_id: String,
  pub matches: Vec<RemoteTask>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
  pub configured: bool,
  pub current: Option<IssueView>,
  pub siblings: Vec<SiblingView>,
}

impl PageView {
  /// Siblings worth a badge: only when configured, only with matches.
  pub fn badges(&self) -> impl Iterator<Item = &SiblingView> {
    self
      .siblings
      .iter()
      .filter(move |sibling| self.configured && !sibling.matches.is_empty())
  }
}

pub trait Presenter: Send + Sync {
  fn render(&self, view: &PageView);

  /// The page stopped being a monitored context.
  fn clear(&self);
}

impl<P: Presenter + ?Sized> Presenter for Arc<P> {
  fn render(&self, view: &PageView) {
    (**self).render(view)
  }

  fn clear(&self) {
    (**self).clear()
  }
}

pub fn status_line(configured: bool, matches: &[RemoteTask]) -> String {
  if !configured {
    return "Todoist token missing. Configure a token to enable duplicate checks.".to_string();
  }
  match matches.len() {
    0 => "No matching Todoist task found yet.".to_string(),
    1 => "Already in Todoist (1 matching task).".to_string(),
    n => format!("Already in Todoist ({n} matching tasks)."),
  }
}

pub fn badge_label(matches: &[RemoteTask]) -> String {
  format!("Todoist {}", matches.len())
}

/// Lines printed for one view
pub fn describe(view: &PageView) -> Vec<String> {
  let mut lines = Vec::new();

  if let Some(current) = &view.current {
    lines.push(format!(
      "{} ({}/{} chars)",
      current.draft.title,
      current.draft.title.chars().count(),
      TASK_TITLE_MAX_CHARS
    ));
    lines.push(format!("  {}", status_line(view.configured, &current.matches)));
    match current.matches.first() {
      Some(existing) if view.configured && !existing.url.is_empty() => {
        lines.push(format!("  Open existing task: {}", existing.url));
      }
      _ => lines.push(format!("  Add to Todoist: {}", current.draft.prefilled_url)),
    }
  }

  for sibling in view.badges() {
    let url = sibling
      .matches
      .first()
      .map(|task| task.url.as_str())
      .unwrap_or_default();
    lines.push(format!(
      "  [{}] {} {}",
      sibling.issue_id,
      badge_label(&sibling.matches),
      url
    ));
  }

  if lines.is_empty() && !view.configured {
    lines.push(status_line(false, &[]));
  }
  lines
}

/// Prints each view to stdout, skipping repeats of the last one.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
  last: Mutex<Option<Vec<String>>>,
}

impl ConsolePresenter {
  fn emit(&self, lines: Vec<String>) {
    let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
    if last.as_ref() == Some(&lines) {
      return;
    }

    let mut stdout = std::io::stdout().lock();
    for line in &lines {
      // Closed stdout only loses output
      let _ = writeln!(stdout, "{line}");
    }
    let _ = stdout.flush();
    *last = Some(lines);
  }
}

impl Presenter for ConsolePresenter {
  fn render(&self, view: &PageView) {
    self.emit(describe(view));
  }

  fn clear(&self) {
    self.emit(vec!["Not a Nightwatch issue page.".to_string()]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::draft::{build_draft, DEFAULT_ADD_URL};

  fn task(id: &str) -> RemoteTask {
    RemoteTask::new(id, format!("[NW:{id}] Boom"), "")
  }

  fn view(configured: bool, matches: Vec<RemoteTask>, siblings: Vec<SiblingView>) -> PageView {
    let issue = IssueRecord {
      issue_id: "42".to_string(),
      title: "Boom".to_string(),
      ..Default::default()
    };
    PageView {
      configured,
      current: Some(IssueView {
        draft: build_draft(&issue, DEFAULT_ADD_URL),
        issue,
        matches,
      }),
      siblings,
    }
  }

  #[test]
  fn test_status_lines() {
    assert!(status_line(false, &[task("1")]).starts_with("Todoist token missing"));
    assert_eq!(status_line(true, &[]), "No matching Todoist task found yet.");
    assert_eq!(
      status_line(true, &[task("1")]),
      "Already in Todoist (1 matching task)."
    );
    assert_eq!(
      status_line(true, &[task("1"), task("2")]),
      "Already in Todoist (2 matching tasks)."
    );
  }

  #[test]
  fn test_describe_links_existing_task() {
    let lines = describe(&view(true, vec![task("1")], Vec::new()));
    assert!(lines[0].starts_with("[Nightwatch] [NW:42] Issue: Boom"));
    assert_eq!(lines[2], "  Open existing task: https://app.todoist.com/app/task/1");
  }

  #[test]
  fn test_describe_offers_draft_without_matches() {
    let lines = describe(&view(true, Vec::new(), Vec::new()));
    assert!(lines[2].starts_with("  Add to Todoist: https://todoist.com/add?"));
  }

  #[test]
  fn test_badges_only_when_configured_with_matches() {
    let siblings = vec![
      SiblingView {
        issue_id: "7".to_string(),
        matches: vec![task("7")],
      },
      SiblingView {
        issue_id: "8".to_string(),
        matches: Vec::new(),
      },
    ];

    let configured = view(true, Vec::new(), siblings.clone());
    let ids: Vec<&str> = configured.badges().map(|s| s.issue_id.as_str()).collect();
    assert_eq!(ids, vec!["7"]);
    assert!(describe(&configured)
      .contains(&"  [7] Todoist 1 https://app.todoist.com/app/task/7".to_string()));

    assert_eq!(view(false, Vec::new(), siblings).badges().count(), 0);
  }
}
