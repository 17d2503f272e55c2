//! Decide which remote tasks already represent a given issue.
//!
//! A task is a hit for an issue when its text carries one of the id
//! encodings in [`rules`], or, as a weaker fallback, when it mentions the
//! product name and contains the issue title's probe phrase verbatim.
//! Hits keep the input task order and are capped at [`MAX_MATCHES_PER_ISSUE`].

pub mod probe;
pub mod rules;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::todoist::types::RemoteTask;
use probe::{normalize_for_match, title_probe};
use rules::IdMatcher;

pub const MAX_MATCHES_PER_ISSUE: usize = 5;

/// Case-insensitive token a task must mention before the title fallback applies
pub const PRODUCT_SIGNAL: &str = "nightwatch";

/// Issue id to the tasks judged to represent it
pub type MatchResult = BTreeMap<String, Vec<RemoteTask>>;

struct Searchable<'a> {
  task: &'a RemoteTask,
  haystack: String,
  has_product_signal: bool,
  normalized: String,
}

/// Match every requested issue id against `tasks`.
///
/// Every id in `issue_ids` gets an entry, empty when nothing matched.
/// `hints` maps issue ids to the title shown for them on the page.
pub fn match_issues(
  tasks: &[RemoteTask],
  issue_ids: &[String],
  hints: &HashMap<String, String>,
) -> MatchResult {
  let searchable: Vec<Searchable<'_>> = tasks
    .iter()
    .map(|task| {
      let haystack = task.haystack();
      Searchable {
        task,
        has_product_signal: haystack.to_lowercase().contains(PRODUCT_SIGNAL),
        normalized: normalize_for_match(&haystack),
        haystack,
      }
    })
    .collect();

  let mut seen = HashSet::new();
  let mut result = MatchResult::new();

  for issue_id in issue_ids {
    if !seen.insert(issue_id.as_str()) {
      continue;
    }

    let matcher = IdMatcher::new(issue_id);
    let probe = hints.get(issue_id).and_then(|title| title_probe(title));

    let hits: Vec<RemoteTask> = searchable
      .iter()
      .filter(|entry| {
        matcher.is_match(&entry.haystack)
          || probe
            .as_deref()
            .is_some_and(|p| entry.has_product_signal && entry.normalized.contains(p))
      })
      .take(MAX_MATCHES_PER_ISSUE)
      .map(|entry| entry.task.clone())
      .collect();

    result.insert(issue_id.clone(), hits);
  }

  result
}
