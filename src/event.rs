use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::page::{PageSnapshot, SharedSnapshot};
use crate::scheduler::Trigger;

/// Commands typed on stdin while watching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Create a task for the current issue
  Create,
  /// Force a refresh, as when the page regains focus
  Refresh,
  /// Re-show the page, as when it becomes visible again
  Show,
  /// Replace the saved token; `None` clears it
  Token(Option<String>),
  Quit,
}

impl Command {
  pub fn parse(line: &str) -> Option<Self> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match word.to_lowercase().as_str() {
      "c" | "create" => Some(Command::Create),
      "r" | "refresh" => Some(Command::Refresh),
      "show" => Some(Command::Show),
      "token" => {
        let token = rest.trim();
        Some(Command::Token((!token.is_empty()).then(|| token.to_string())))
      }
      "q" | "quit" | "exit" => Some(Command::Quit),
      _ => None,
    }
  }
}

/// Application events
#[derive(Debug)]
pub enum Event {
  /// The watched page changed
  Page(Trigger),
  Command(Command),
  /// Stdin reached end of file
  InputClosed,
}

/// Decide which trigger, if any, a new snapshot should fire
pub fn classify(previous: Option<&PageSnapshot>, next: &PageSnapshot) -> Option<Trigger> {
  match previous {
    None => Some(Trigger::Initial),
    Some(previous) if previous.url != next.url => Some(Trigger::UrlChanged),
    Some(previous) if previous != next => Some(Trigger::PageMutated),
    Some(_) => None,
  }
}

/// Event handler that produces events from a polled snapshot file and stdin
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl Default for EventHandler {
  fn default() -> Self {
    Self::new()
  }
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Poll `path` every `interval`, publishing changes into `shared`.
  /// Unreadable snapshots keep the last good one.
  pub fn watch_snapshot(&self, path: PathBuf, shared: SharedSnapshot, interval: Duration) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      let mut last_error: Option<String> = None;

      while !tx.is_closed() {
        ticker.tick().await;
        let snapshot = match PageSnapshot::load(&path).await {
          Ok(snapshot) => snapshot,
          Err(err) => {
            let message = format!("{err:#}");
            if last_error.as_ref() != Some(&message) {
              warn!(error = %message, "page snapshot unavailable");
              last_error = Some(message);
            }
            continue;
          }
        };
        last_error = None;

        let Some(trigger) = classify(shared.get().as_ref(), &snapshot) else {
          continue;
        };
        debug!(?trigger, url = %snapshot.url, "page snapshot changed");
        shared.replace(snapshot);
        if tx.send(Event::Page(trigger)).is_err() {
          break;
        }
      }
    });
  }

  /// Read commands from stdin, one per line.
  pub fn read_commands(&self) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let mut lines = BufReader::new(tokio::io::stdin()).lines();
      loop {
        let event = match lines.next_line().await {
          Ok(Some(line)) => match Command::parse(&line) {
            Some(command) => Event::Command(command),
            None => {
              if !line.trim().is_empty() {
                warn!(input = %line.trim(), "unknown command");
              }
              continue;
            }
          },
          Ok(None) => Event::InputClosed,
          Err(err) => {
            warn!(%err, "failed to read stdin");
            Event::InputClosed
          }
        };

        let closed = matches!(event, Event::InputClosed);
        if tx.send(event).is_err() || closed {
          break;
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
