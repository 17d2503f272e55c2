//! Encodings that tie a task's text to an issue id.
//!
//! Each rule is an independent case-insensitive predicate; a task refers to
//! an issue when any rule matches. The id is always escaped before it is
//! embedded in a pattern.

use regex::{Regex, RegexBuilder};

/// Characters that may not follow the id: the next character must not
/// extend it, so `#42` does not match inside `#422`.
const ID_END: &str = r"(?:[^0-9A-Za-z_]|$)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRule {
  /// `[NW:<id>]` as written into draft titles
  BracketMarker,
  /// `Nightwatch Key: issue:<id>` as written into draft bodies
  KeyLine,
  /// `Issue ID: <id>`
  IssueIdLine,
  /// `#<id>`
  HashToken,
  /// `/exceptions/<id>` or `/issues/<id>` (singular forms too), e.g. a pasted page URL
  UrlSegment,
}

impl IdRule {
  pub const ALL: [IdRule; 5] = [
    IdRule::BracketMarker,
    IdRule::KeyLine,
    IdRule::IssueIdLine,
    IdRule::HashToken,
    IdRule::UrlSegment,
  ];

  fn pattern(self, escaped_id: &str) -> String {
    match self {
      IdRule::BracketMarker => format!(r"\[nw:{escaped_id}\]"),
      IdRule::KeyLine => format!(r"nightwatch\s+key\s*:\s*issue:{escaped_id}{ID_END}"),
      IdRule::IssueIdLine => format!(r"issue\s+id\s*:\s*{escaped_id}{ID_END}"),
      IdRule::HashToken => format!(r"#{escaped_id}{ID_END}"),
      IdRule::UrlSegment => format!(r"/(?:exceptions?|issues?)/{escaped_id}{ID_END}"),
    }
  }

  pub fn compile(self, issue_id: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&self.pattern(&regex::escape(issue_id)))
      .case_insensitive(true)
      .build()
  }
}

/// All rules compiled for one issue id
pub struct IdMatcher {
  rules: Vec<(IdRule, Regex)>,
}

impl IdMatcher {
  pub fn new(issue_id: &str) -> Self {
    // Escaped input keeps every pattern valid; a rule that still fails to
    // compile (size limits on absurd ids) is skipped rather than matched.
    let rules = IdRule::ALL
      .iter()
      .filter_map(|rule| rule.compile(issue_id).ok().map(|re| (*rule, re)))
      .collect();
    Self { rules }
  }

  /// First rule that matches `text`, if any
  pub fn matching_rule(&self, text: &str) -> Option<IdRule> {
    self
      .rules
      .iter()
      .find(|(_, re)| re.is_match(text))
      .map(|(rule, _)| *rule)
  }

  pub fn is_match(&self, text: &str) -> bool {
    self.matching_rule(text).is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn matches(rule: IdRule, id: &str, text: &str) -> bool {
    rule.compile(id).unwrap().is_match(text)
  }

  #[test]
  fn test_bracket_marker() {
    assert!(matches(IdRule::BracketMarker, "42", "[Nightwatch] [NW:42] Issue: Boom"));
    assert!(matches(IdRule::BracketMarker, "42", "[nw:42]"));
    assert!(!matches(IdRule::BracketMarker, "42", "[NW:422]"));
    assert!(!matches(IdRule::BracketMarker, "42", "NW:42"));
  }

  #[test]
  fn test_key_line() {
    assert!(matches(IdRule::KeyLine, "abc", "Nightwatch Key: issue:abc\nSource: x"));
    assert!(matches(IdRule::KeyLine, "abc", "nightwatch   key :issue:ABC"));
    assert!(!matches(IdRule::KeyLine, "abc", "Nightwatch Key: issue:abcd"));
  }

  #[test]
  fn test_issue_id_line() {
    assert!(matches(IdRule::IssueIdLine, "42", "Issue ID: 42"));
    assert!(matches(IdRule::IssueIdLine, "42", "issue id:42\n"));
    assert!(!matches(IdRule::IssueIdLine, "42", "Issue ID: 421"));
  }

  #[test]
  fn test_hash_token() {
    assert!(matches(IdRule::HashToken, "42", "See #42 for details"));
    assert!(matches(IdRule::HashToken, "42", "Regression of #42"));
    assert!(matches(IdRule::HashToken, "42", "#42."));
    assert!(!matches(IdRule::HashToken, "42", "Ticket #422"));
    assert!(!matches(IdRule::HashToken, "42", "42 without hash"));
  }

  #[test]
  fn test_url_segment() {
    assert!(matches(
      IdRule::UrlSegment,
      "9f1c",
      "https://nightwatch.laravel.com/apps/1/exceptions/9f1c?tab=trace"
    ));
    assert!(matches(IdRule::UrlSegment, "9f1c", "/issue/9f1c/"));
    assert!(matches(IdRule::UrlSegment, "9f1c", "/issues/9f1c#top"));
    assert!(matches(IdRule::UrlSegment, "9f1c", "/EXCEPTIONS/9F1C"));
    assert!(!matches(IdRule::UrlSegment, "9f1c", "/exceptions/9f1c2"));
    assert!(!matches(IdRule::UrlSegment, "9f1c", "/problems/9f1c"));
  }

  #[test]
  fn test_id_is_escaped() {
    assert!(matches(IdRule::BracketMarker, "a.b", "[NW:a.b]"));
    assert!(!matches(IdRule::BracketMarker, "a.b", "[NW:axb]"));
    assert!(matches(IdRule::HashToken, "1+1", "#1+1 "));
    assert!(!matches(IdRule::HashToken, "(x)", "#x"));
  }

  #[test]
  fn test_matcher_reports_first_rule() {
    let matcher = IdMatcher::new("42");
    assert_eq!(
      matcher.matching_rule("[NW:42] also #42"),
      Some(IdRule::BracketMarker)
    );
    assert_eq!(matcher.matching_rule("only #42"), Some(IdRule::HashToken));
    assert_eq!(matcher.matching_rule("unrelated 422"), None);
  }
}
