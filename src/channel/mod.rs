//! Request/response channel between the page client and the background service.
//!
//! The client side only sees [`ChannelClient`]; the in-process transport
//! queues requests on an mpsc channel and waits for a oneshot reply.

pub mod messages;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use messages::{IssueHint, Request, Response};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
  /// The background service is gone.
  #[error("background service unavailable")]
  Closed,

  #[error("no response from background service within {0:?}")]
  Timeout(Duration),

  /// The service dropped the request without replying.
  #[error("background service dropped the request")]
  Dropped,
}

#[async_trait]
pub trait ChannelClient: Send + Sync {
  async fn request(&self, request: Request) -> Result<Response, ChannelError>;
}

#[async_trait]
impl<C: ChannelClient + ?Sized> ChannelClient for Arc<C> {
  async fn request(&self, request: Request) -> Result<Response, ChannelError> {
    (**self).request(request).await
  }
}

/// A request waiting for the service, with the slot its reply goes into
#[derive(Debug)]
pub struct Envelope {
  pub request: Request,
  pub reply: oneshot::Sender<Response>,
}

/// Client half of the in-process transport
#[derive(Debug, Clone)]
pub struct InProcessChannel {
  tx: mpsc::UnboundedSender<Envelope>,
  timeout: Duration,
}

impl InProcessChannel {
  /// Create a connected client and the receiver the service drains.
  pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx, timeout }, rx)
  }
}

#[async_trait]
impl ChannelClient for InProcessChannel {
  async fn request(&self, request: Request) -> Result<Response, ChannelError> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(Envelope { request, reply })
      .map_err(|_| ChannelError::Closed)?;

    match tokio::time::timeout(self.timeout, rx).await {
      Ok(Ok(response)) => Ok(response),
      Ok(Err(_)) => Err(ChannelError::Dropped),
      Err(_) => Err(ChannelError::Timeout(self.timeout)),
    }
  }
}
