use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::background::BackgroundService;
use crate::channel::{ChannelClient, InProcessChannel, IssueHint, Request, Response};
use crate::config::Config;
use crate::credentials::{Credential, CredentialStore};
use crate::draft::{build_draft, Draft, IssueRecord};
use crate::event::{Command, Event, EventHandler};
use crate::page::{PageSnapshot, PageSource, SharedSnapshot};
use crate::presenter::{status_line, ConsolePresenter};
use crate::scheduler::{CreateOutcome, ReconciliationScheduler, SchedulerSettings, Trigger};
use crate::todoist::client::TodoistClient;
use crate::todoist::store::{RemoteTaskStore, StoreSettings};

type Scheduler = ReconciliationScheduler<InProcessChannel, SharedSnapshot, ConsolePresenter>;

/// Main application state: the background service and a client channel to it
pub struct App {
  config: Config,
  credentials: CredentialStore,
  channel: InProcessChannel,
}

impl App {
  /// Start the background service. Must be called inside a tokio runtime.
  pub fn new(config: Config) -> Result<Self> {
    let credentials = CredentialStore::new(config.credential());
    if let Some(credential) = credentials.current() {
      debug!(token = %credential.fingerprint(), "using Todoist token");
    }

    let client = TodoistClient::new(&config.todoist)?;
    let store = RemoteTaskStore::new(client, StoreSettings::from(&config.todoist));
    let service = Arc::new(BackgroundService::new(credentials.clone(), store));

    let (channel, rx) = InProcessChannel::new(config.client.request_timeout());
    service.watch_credentials();
    service.serve(rx);

    Ok(Self {
      config,
      credentials,
      channel,
    })
  }

  async fn request(&self, request: Request) -> Result<Response> {
    let response = self.channel.request(request).await?;
    if !response.ok {
      let error = response.error.unwrap_or_else(|| "request failed".to_string());
      return Err(eyre!(error));
    }
    Ok(response)
  }

  fn scheduler(&self, page: SharedSnapshot) -> Arc<Scheduler> {
    Arc::new(ReconciliationScheduler::new(
      self.channel.clone(),
      page,
      ConsolePresenter::default(),
      SchedulerSettings::from(&self.config.client),
      self.config.todoist.add_url.clone(),
    ))
  }

  /// Verify the configured token against Todoist.
  pub async fn check(&self) -> Result<()> {
    self.request(Request::TestCredential).await?;
    let fingerprint = self
      .credentials
      .current()
      .map(|credential| credential.fingerprint())
      .unwrap_or_default();
    println!("Todoist token OK ({fingerprint})");
    Ok(())
  }

  /// Print the tasks that already track each issue. `titles` pair with
  /// `issues` by position.
  pub async fn find_matches(&self, issues: &[String], titles: &[String]) -> Result<()> {
    let issue_hints: HashMap<String, IssueHint> = issues
      .iter()
      .zip(titles)
      .map(|(id, title)| {
        (
          id.clone(),
          IssueHint {
            title: title.clone(),
          },
        )
      })
      .collect();

    let response = self
      .request(Request::FindMatches {
        issue_ids: issues.to_vec(),
        issue_hints,
      })
      .await?;

    let matches = response.matches.unwrap_or_default();
    for id in issues {
      let tasks = matches
        .get(id.trim())
        .map(Vec::as_slice)
        .unwrap_or_default();
      println!("{id}: {}", status_line(response.configured, tasks));
      for task in tasks {
        println!("  {} {}", task.url, task.content);
      }
    }
    Ok(())
  }

  /// Print the draft for the issue open in `snapshot`.
  pub async fn draft(&self, snapshot: &Path) -> Result<()> {
    let draft = self.draft_for(snapshot).await?.1;
    println!("{}\n\n{}\n\n{}", draft.title, draft.body, draft.prefilled_url);
    Ok(())
  }

  /// Create a task for the issue open in `snapshot` unless one already
  /// tracks it. Without a token, or when creation fails, print the
  /// prefilled add-task link instead.
  pub async fn create(&self, snapshot: &Path, force: bool) -> Result<()> {
    let (issue, draft) = self.draft_for(snapshot).await?;

    if !force {
      let response = self
        .request(Request::FindMatches {
          issue_ids: vec![issue.issue_id.clone()],
          issue_hints: HashMap::from([(
            issue.issue_id.clone(),
            IssueHint {
              title: issue.title.clone(),
            },
          )]),
        })
        .await?;
      let existing = response
        .matches
        .and_then(|mut matches| matches.remove(&issue.issue_id))
        .unwrap_or_default();
      if !existing.is_empty() {
        println!("{}", status_line(true, &existing));
        for task in existing {
          println!("  {} {}", task.url, task.content);
        }
        return Ok(());
      }
    }

    let page = SharedSnapshot::default();
    let scheduler = self.scheduler(page);
    report_create(scheduler.create_task(&draft).await);
    Ok(())
  }

  async fn draft_for(&self, snapshot: &Path) -> Result<(IssueRecord, Draft)> {
    let snapshot = PageSnapshot::load(snapshot).await?;
    let context = snapshot.context();
    if !context.monitored {
      return Err(eyre!("{} is not a Nightwatch page", snapshot.url));
    }
    let issue = context
      .current
      .ok_or_else(|| eyre!("no issue found on {}", snapshot.url))?;
    let draft = build_draft(&issue, &self.config.todoist.add_url);
    Ok((issue, draft))
  }

  /// Draft for the issue on the watched page, if it shows one
  fn current_draft(&self, page: &SharedSnapshot) -> Option<Draft> {
    let issue = page.context().current?;
    Some(build_draft(&issue, &self.config.todoist.add_url))
  }

  /// Follow the page snapshot at `path` until quit or Ctrl-C.
  pub async fn watch(&self, path: PathBuf) -> Result<()> {
    let page = SharedSnapshot::default();
    let scheduler = self.scheduler(page.clone());

    let mut events = EventHandler::new();
    events.watch_snapshot(path, page.clone(), self.config.client.url_poll());
    events.read_commands();

    let mut credential_changes = self.credentials.subscribe();
    let on_change = Arc::clone(&scheduler);
    tokio::spawn(async move {
      while credential_changes.changed().await.is_ok() {
        on_change.trigger(Trigger::CredentialChanged);
      }
    });

    info!("watching page snapshot");
    loop {
      let event = tokio::select! {
        event = events.next() => event,
        _ = tokio::signal::ctrl_c() => None,
      };
      let Some(event) = event else {
        break;
      };

      match event {
        Event::Page(trigger) => {
          debug!(?trigger, state = ?scheduler.state(), "page changed");
          scheduler.trigger(trigger);
        }
        Event::Command(Command::Refresh) => {
          scheduler.trigger(Trigger::FocusRegained);
        }
        Event::Command(Command::Show) => {
          scheduler.trigger(Trigger::BecameVisible);
        }
        Event::Command(Command::Token(token)) => {
          let credential = token.as_deref().and_then(Credential::parse);
          if !self.credentials.replace(credential) {
            println!("Token unchanged.");
          }
        }
        Event::Command(Command::Create) => match self.current_draft(&page) {
          Some(draft) => report_create(scheduler.create_task(&draft).await),
          None => println!("No issue on this page."),
        },
        Event::Command(Command::Quit) => break,
        Event::InputClosed => debug!("stdin closed; still watching"),
      }
    }

    Ok(())
  }
}

fn report_create(outcome: CreateOutcome) {
  match outcome {
    CreateOutcome::Created(task) => println!("Created {} {}", task.url, task.content),
    CreateOutcome::OpenDraft { url, reason } => {
      if let Some(reason) = reason {
        println!("Could not create the task through the API: {reason}");
      } else {
        println!("No Todoist token is saved.");
      }
      println!("Open the prefilled draft: {url}");
    }
  }
}
