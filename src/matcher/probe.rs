/// Normalized titles shorter than this are too weak to disambiguate
const MIN_PROBE_CHARS: usize = 12;
/// Words of this length or shorter are dropped from the probe
const MIN_WORD_CHARS: usize = 3;
const MAX_PROBE_WORDS: usize = 8;

/// Lowercase and collapse every run of characters outside `[a-z0-9]` into one space.
pub fn normalize_for_match(value: &str) -> String {
  let mut normalized = String::with_capacity(value.len());
  let mut pending_space = false;

  for c in value.chars().flat_map(char::to_lowercase) {
    if c.is_ascii_lowercase() || c.is_ascii_digit() {
      if pending_space && !normalized.is_empty() {
        normalized.push(' ');
      }
      pending_space = false;
      normalized.push(c);
    } else {
      pending_space = true;
    }
  }

  normalized
}

/// Build the contiguous phrase searched for in task text when the id itself is absent.
///
/// Returns `None` when the title is too short or has no usable words.
pub fn title_probe(title: &str) -> Option<String> {
  let normalized = normalize_for_match(title);
  if normalized.len() < MIN_PROBE_CHARS {
    return None;
  }

  let words: Vec<&str> = normalized
    .split(' ')
    .filter(|word| word.len() >= MIN_WORD_CHARS)
    .take(MAX_PROBE_WORDS)
    .collect();

  if words.is_empty() {
    None
  } else {
    Some(words.join(" "))
  }
}
