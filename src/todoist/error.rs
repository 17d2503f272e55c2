use thiserror::Error;

/// Longest slice of a failed response body kept for diagnostics
pub const ERROR_DETAILS_MAX_CHARS: usize = 300;

/// Failure talking to the task tracker over HTTP.
#[derive(Debug, Error)]
pub enum TrackerError {
  /// HTTP 410: the client is pointed at a retired API version.
  #[error(
    "Todoist API request failed (410). The endpoint is deprecated. Verify the configured API base uses /api/v1."
  )]
  DeprecatedEndpoint,

  /// Any other non-2xx response.
  #[error("Todoist API {operation} failed ({status}). {details}")]
  Status {
    operation: &'static str,
    status: u16,
    details: String,
  },

  #[error("Todoist API request could not be sent: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("Todoist API returned an unreadable body: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("invalid Todoist API URL: {0}")]
  Url(#[from] url::ParseError),
}

/// Failure of a remote task store operation.
#[derive(Debug, Error)]
pub enum StoreError {
  /// A page of the task listing failed; nothing was cached.
  #[error("failed to fetch active tasks (page {page})")]
  RemoteFetch {
    page: usize,
    #[source]
    source: TrackerError,
  },

  /// The create call failed; the cache was left untouched.
  #[error("failed to create task")]
  RemoteCreate(#[source] TrackerError),
}

/// Keep at most `ERROR_DETAILS_MAX_CHARS` characters of a response body.
pub fn truncate_details(body: &str) -> String {
  body.chars().take(ERROR_DETAILS_MAX_CHARS).collect()
}
