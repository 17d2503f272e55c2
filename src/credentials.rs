//! The persisted credential and change notifications for it.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Bearer token for the task tracker. Never printed; use `fingerprint()` in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
  /// Trim the raw value; blank input means "unconfigured".
  pub fn parse(raw: &str) -> Option<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(Self(trimmed.to_string()))
    }
  }

  pub fn expose(&self) -> &str {
    &self.0
  }

  /// Short stable identifier safe to log
  pub fn fingerprint(&self) -> String {
    let digest = Sha256::digest(self.0.as_bytes());
    hex::encode(&digest[..4])
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Credential({})", self.fingerprint())
  }
}

/// Holds the current credential; subscribers are told whenever it changes.
#[derive(Debug, Clone)]
pub struct CredentialStore {
  tx: Arc<watch::Sender<Option<Credential>>>,
}

impl CredentialStore {
  pub fn new(initial: Option<Credential>) -> Self {
    let (tx, _rx) = watch::channel(initial);
    Self { tx: Arc::new(tx) }
  }

  pub fn current(&self) -> Option<Credential> {
    self.tx.borrow().clone()
  }

  /// Store a new value. Returns `true` if it differed from the previous one.
  pub fn replace(&self, credential: Option<Credential>) -> bool {
    self.tx.send_if_modified(|current| {
      if *current == credential {
        return false;
      }
      *current = credential;
      true
    })
  }

  pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
    self.tx.subscribe()
  }
}
