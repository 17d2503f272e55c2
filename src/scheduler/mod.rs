//! Client-side reconciliation: debounced passes that read the page, ask the
//! background service for matches and hand the result to a presenter.
//!
//! Every pass takes a [`PassToken`] when it starts. A pass that finds its
//! token stale after a suspension point drops its result, so only the most
//! recently started pass ever reaches the presenter.

pub mod caches;
pub mod token;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{ChannelClient, Request, Response};
use crate::config::ClientConfig;
use crate::draft::{build_draft, Draft};
use crate::matcher::MatchResult;
use crate::page::PageSource;
use crate::presenter::{IssueView, PageView, Presenter, SiblingView};
use crate::todoist::types::RemoteTask;
use caches::{ClientCaches, MatchRequest};
use token::{GenerationCounter, PassToken, Superseded};

/// Why a pass was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  Initial,
  PageMutated,
  UrlChanged,
  FocusRegained,
  BecameVisible,
  TaskCreated,
  CredentialChanged,
}

impl Trigger {
  /// Triggers that clear both client caches before scheduling
  pub fn forces_refresh(self) -> bool {
    matches!(
      self,
      Trigger::FocusRegained | Trigger::BecameVisible | Trigger::TaskCreated | Trigger::CredentialChanged
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  Idle,
  Scheduled,
  Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
  Rendered,
  /// Page is not a monitored context
  Cleared,
  Superseded(Superseded),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
  Created(RemoteTask),
  /// Open the prefilled add-task page instead; `reason` is set when the
  /// create call was attempted and failed.
  OpenDraft { url: String, reason: Option<String> },
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
  pub debounce: Duration,
  pub match_ttl: Duration,
  pub config_ttl: Duration,
  pub post_create_refresh: Duration,
}

impl From<&ClientConfig> for SchedulerSettings {
  fn from(config: &ClientConfig) -> Self {
    Self {
      debounce: config.debounce(),
      match_ttl: config.match_cache_ttl(),
      config_ttl: config.config_cache_ttl(),
      post_create_refresh: config.post_create_refresh(),
    }
  }
}

impl Default for SchedulerSettings {
  fn default() -> Self {
    Self::from(&ClientConfig::default())
  }
}

/// Decrements the running count when a pass ends, however it ends
struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
  fn enter(count: &'a AtomicUsize) -> Self {
    count.fetch_add(1, Ordering::SeqCst);
    Self(count)
  }
}

impl Drop for RunningGuard<'_> {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

pub struct ReconciliationScheduler<C, P, R> {
  channel: C,
  page: P,
  presenter: R,
  settings: SchedulerSettings,
  add_url: String,
  caches: Mutex<ClientCaches>,
  generation: GenerationCounter,
  scheduled: AtomicBool,
  running: AtomicUsize,
}

impl<C, P, R> ReconciliationScheduler<C, P, R>
where
  C: ChannelClient + 'static,
  P: PageSource + 'static,
  R: Presenter + 'static,
{
  pub fn new(
    channel: C,
    page: P,
    presenter: R,
    settings: SchedulerSettings,
    add_url: impl Into<String>,
  ) -> Self {
    Self {
      channel,
      page,
      presenter,
      settings,
      add_url: add_url.into(),
      caches: Mutex::new(ClientCaches::default()),
      generation: GenerationCounter::default(),
      scheduled: AtomicBool::new(false),
      running: AtomicUsize::new(0),
    }
  }

  pub fn state(&self) -> SchedulerState {
    if self.scheduled.load(Ordering::SeqCst) {
      SchedulerState::Scheduled
    } else if self.running.load(Ordering::SeqCst) > 0 {
      SchedulerState::Running
    } else {
      SchedulerState::Idle
    }
  }

  fn caches(&self) -> MutexGuard<'_, ClientCaches> {
    self.caches.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn invalidate_caches(&self) {
    self.caches().clear();
  }

  /// Schedule a pass after the quiet period. Returns false when a pass was
  /// already pending; the pending one absorbs this trigger without waiting
  /// any longer.
  pub fn trigger(self: &Arc<Self>, trigger: Trigger) -> bool {
    if trigger.forces_refresh() {
      self.invalidate_caches();
    }

    if self.scheduled.swap(true, Ordering::SeqCst) {
      debug!(?trigger, "pass already scheduled");
      return false;
    }

    debug!(?trigger, "scheduling pass");
    let scheduler = Arc::clone(self);
    tokio::spawn(async move {
      tokio::time::sleep(scheduler.settings.debounce).await;
      scheduler.scheduled.store(false, Ordering::SeqCst);
      scheduler.run_pass().await;
    });
    true
  }

  /// Run one pass now.
  pub async fn run_pass(&self) -> PassOutcome {
    let token = self.generation.begin();
    let _running = RunningGuard::enter(&self.running);

    match self.reconcile(&token).await {
      Ok(outcome) => outcome,
      Err(superseded) => {
        debug!(%superseded, "dropping pass result");
        PassOutcome::Superseded(superseded)
      }
    }
  }

  async fn reconcile(&self, token: &PassToken) -> Result<PassOutcome, Superseded> {
    let settings_configured = self.resolve_configuration().await;
    token.check()?;

    let context = self.page.context();
    if !context.monitored {
      self.presenter.clear();
      return Ok(PassOutcome::Cleared);
    }

    let request = MatchRequest::from_context(&context);
    let (match_configured, matches) = self.resolve_matches(&request).await;
    token.check()?;

    let matches_for = |id: &str| matches.get(id).cloned().unwrap_or_default();
    let view = PageView {
      configured: settings_configured || match_configured,
      current: context.current.map(|issue| IssueView {
        draft: build_draft(&issue, &self.add_url),
        matches: matches_for(&issue.issue_id),
        issue,
      }),
      siblings: context
        .siblings
        .iter()
        .map(|sibling| SiblingView {
          issue_id: sibling.issue_id.clone(),
          matches: matches_for(&sibling.issue_id),
        })
        .collect(),
    };

    debug!(
      generation = token.generation(),
      configured = view.configured,
      siblings = view.siblings.len(),
      "rendering pass"
    );
    self.presenter.render(&view);
    Ok(PassOutcome::Rendered)
  }

  /// Configured state from the config cache, refetched when stale. A failed
  /// refetch keeps the last known value.
  async fn resolve_configuration(&self) -> bool {
    if let Some(configured) = self.caches().fresh_config(self.settings.config_ttl) {
      debug!("configuration cache hit");
      return configured;
    }

    let epoch = self.caches().epoch();
    let requested_at = Instant::now();
    match self.channel.request(Request::GetSettings).await {
      Ok(Response {
        ok: true,
        configured,
        ..
      }) => {
        if !self.caches().store_config(epoch, configured, requested_at) {
          debug!("caches cleared during settings request; not storing");
        }
        configured
      }
      Ok(response) => {
        warn!(error = ?response.error, "settings request rejected");
        self.caches().last_configured()
      }
      Err(err) => {
        warn!(%err, "settings request failed");
        self.caches().last_configured()
      }
    }
  }

  /// Matches from the match cache, or from the background service on a miss.
  /// A failed request yields no matches for this pass.
  async fn resolve_matches(&self, request: &MatchRequest) -> (bool, MatchResult) {
    if request.is_empty() {
      return (self.caches().last_configured(), MatchResult::new());
    }

    let signature = request.signature();
    if let Some(hit) = self
      .caches()
      .fresh_matches(&signature, self.settings.match_ttl)
    {
      debug!(issues = request.issue_ids.len(), "match cache hit");
      return hit;
    }

    let epoch = self.caches().epoch();
    let requested_at = Instant::now();
    let response = self
      .channel
      .request(Request::FindMatches {
        issue_ids: request.issue_ids.clone(),
        issue_hints: request.hints.clone(),
      })
      .await;

    match response {
      Ok(Response {
        ok: true,
        configured,
        matches,
        ..
      }) => {
        let matches = matches.unwrap_or_default();
        let mut caches = self.caches();
        let stored = caches.store_matches(epoch, signature, configured, matches.clone(), requested_at);
        if stored {
          caches.store_config(epoch, configured, requested_at);
        } else {
          debug!("caches cleared during match request; not storing");
        }
        (configured, matches)
      }
      Ok(response) => {
        warn!(error = ?response.error, "match request rejected");
        (self.caches().last_configured(), MatchResult::new())
      }
      Err(err) => {
        warn!(%err, "match request failed");
        (self.caches().last_configured(), MatchResult::new())
      }
    }
  }

  /// Create a task from `draft`, falling back to its prefilled add-task page
  /// when no token is configured or the create call fails.
  pub async fn create_task(self: &Arc<Self>, draft: &Draft) -> CreateOutcome {
    if !self.resolve_configuration().await {
      info!("no token configured; opening draft");
      self.refresh_after_create();
      return CreateOutcome::OpenDraft {
        url: draft.prefilled_url.clone(),
        reason: None,
      };
    }

    let response = self
      .channel
      .request(Request::CreateTask {
        content: draft.title.clone(),
        description: draft.body.clone(),
      })
      .await;

    let reason = match response {
      Ok(Response {
        ok: true,
        task: Some(task),
        ..
      }) => {
        info!(task = %task.id, "task created");
        self.refresh_after_create();
        return CreateOutcome::Created(task);
      }
      Ok(response) => response
        .error
        .unwrap_or_else(|| "task was not created".to_string()),
      Err(err) => err.to_string(),
    };

    warn!(%reason, "task creation failed; opening draft");
    self.refresh_after_create();
    CreateOutcome::OpenDraft {
      url: draft.prefilled_url.clone(),
      reason: Some(reason),
    }
  }

  /// Refresh now, then once more after the tracker had time to list the task.
  fn refresh_after_create(self: &Arc<Self>) {
    self.trigger(Trigger::TaskCreated);

    let scheduler = Arc::clone(self);
    tokio::spawn(async move {
      tokio::time::sleep(scheduler.settings.post_create_refresh).await;
      scheduler.trigger(Trigger::TaskCreated);
    });
  }
}
