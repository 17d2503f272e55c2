//! Pass tokens: starting a pass makes every earlier token stale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pass {generation} superseded by pass {latest}")]
pub struct Superseded {
  pub generation: u64,
  pub latest: u64,
}

/// Monotonic pass counter. Never resets.
#[derive(Debug, Default)]
pub struct GenerationCounter {
  latest: Arc<AtomicU64>,
}

impl GenerationCounter {
  /// Start a new pass, invalidating all tokens handed out before.
  pub fn begin(&self) -> PassToken {
    let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
    PassToken {
      generation,
      latest: Arc::clone(&self.latest),
    }
  }
}

/// Held by one pass; checked after every suspension point.
#[derive(Debug, Clone)]
pub struct PassToken {
  generation: u64,
  latest: Arc<AtomicU64>,
}

impl PassToken {
  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn is_current(&self) -> bool {
    self.latest.load(Ordering::SeqCst) == self.generation
  }

  pub fn check(&self) -> Result<(), Superseded> {
    if self.is_current() {
      return Ok(());
    }
    Err(Superseded {
      generation: self.generation,
      latest: self.latest.load(Ordering::SeqCst),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_generations_increase() {
    let counter = GenerationCounter::default();
    assert_eq!(counter.begin().generation(), 1);
    assert_eq!(counter.begin().generation(), 2);
  }

  #[test]
  fn test_new_pass_supersedes_old() {
    let counter = GenerationCounter::default();
    let first = counter.begin();
    assert!(first.is_current());

    let second = counter.begin();
    assert!(!first.is_current());
    assert!(second.is_current());
    assert_eq!(
      first.check(),
      Err(Superseded {
        generation: 1,
        latest: 2
      })
    );
    assert_eq!(second.check(), Ok(()));
  }
}
