//! Short-lived client caches layered over the channel.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::channel::IssueHint;
use crate::matcher::MatchResult;
use crate::page::{IssueRef, PageContext};

/// Characters of each title hint that take part in the signature
const HINT_SIGNATURE_CHARS: usize = 120;

/// The set of issues one pass asks about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRequest {
  /// Trimmed, sorted, de-duplicated
  pub issue_ids: Vec<String>,
  pub hints: HashMap<String, IssueHint>,
}

impl MatchRequest {
  /// Later refs override earlier hints for the same id.
  pub fn new<'a>(refs: impl IntoIterator<Item = &'a IssueRef>) -> Self {
    let mut issue_ids = Vec::new();
    let mut hints = HashMap::new();

    for issue in refs {
      let id = issue.issue_id.trim();
      if id.is_empty() {
        continue;
      }
      issue_ids.push(id.to_string());
      if let Some(title) = &issue.title_hint {
        hints.insert(
          id.to_string(),
          IssueHint {
            title: title.clone(),
          },
        );
      }
    }

    issue_ids.sort();
    issue_ids.dedup();
    Self { issue_ids, hints }
  }

  /// Current issue (its page title as hint) followed by the listed siblings
  pub fn from_context(context: &PageContext) -> Self {
    let current = context.current.as_ref().map(|issue| IssueRef {
      issue_id: issue.issue_id.clone(),
      title_hint: Some(issue.title.clone()),
    });
    Self::new(current.iter().chain(context.siblings.iter()))
  }

  pub fn is_empty(&self) -> bool {
    self.issue_ids.is_empty()
  }

  /// Stable digest of the ids and a bounded excerpt of each hint
  pub fn signature(&self) -> String {
    let hints: Vec<String> = self
      .issue_ids
      .iter()
      .map(|id| {
        let excerpt: String = self
          .hints
          .get(id)
          .map(|hint| hint.title.chars().take(HINT_SIGNATURE_CHARS).collect())
          .unwrap_or_default();
        format!("{id}:{excerpt}")
      })
      .collect();
    let input = format!("{}::{}", self.issue_ids.join("|"), hints.join("|"));

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

#[derive(Debug, Clone)]
struct MatchEntry {
  signature: String,
  fetched_at: Instant,
  configured: bool,
  matches: MatchResult,
}

#[derive(Debug, Clone, Copy)]
struct ConfigEntry {
  fetched_at: Instant,
  configured: bool,
}

/// Match results and configuration state, each with its own TTL.
///
/// Every `clear` starts a new epoch. Answers to requests sent in an earlier
/// epoch are not stored.
#[derive(Debug, Default)]
pub struct ClientCaches {
  matches: Option<MatchEntry>,
  config: Option<ConfigEntry>,
  epoch: u64,
}

impl ClientCaches {
  /// Capture before sending a request; pass back when storing its answer.
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn fresh_config(&self, ttl: Duration) -> Option<bool> {
    self
      .config
      .filter(|entry| entry.fetched_at.elapsed() < ttl)
      .map(|entry| entry.configured)
  }

  /// Last configuration seen, however old; unconfigured when never fetched
  pub fn last_configured(&self) -> bool {
    self.config.is_some_and(|entry| entry.configured)
  }

  /// Returns false when the caches were cleared since `epoch`.
  pub fn store_config(&mut self, epoch: u64, configured: bool, fetched_at: Instant) -> bool {
    if epoch != self.epoch {
      return false;
    }
    self.config = Some(ConfigEntry {
      fetched_at,
      configured,
    });
    true
  }

  pub fn fresh_matches(&self, signature: &str, ttl: Duration) -> Option<(bool, MatchResult)> {
    self
      .matches
      .as_ref()
      .filter(|entry| entry.signature == signature && entry.fetched_at.elapsed() < ttl)
      .map(|entry| (entry.configured, entry.matches.clone()))
  }

  pub fn store_matches(
    &mut self,
    epoch: u64,
    signature: String,
    configured: bool,
    matches: MatchResult,
    fetched_at: Instant,
  ) -> bool {
    if epoch != self.epoch {
      return false;
    }
    self.matches = Some(MatchEntry {
      signature,
      fetched_at,
      configured,
      matches,
    });
    true
  }

  pub fn clear(&mut self) {
    self.matches = None;
    self.config = None;
    self.epoch += 1;
  }
}
