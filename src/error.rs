//! Error types shared across the crate.

use serde_json::Value;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error taxonomy for data-access operations.
///
/// `Network` means no response was received at all; `Http` carries the
/// status and body of a server-returned failure; `Validation` is raised
/// before any network call when a request is malformed on our side.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Transport failure - the request never produced a response.
  #[error("network error: {message}")]
  Network { message: String },

  /// The server answered with a non-success status.
  #[error("HTTP {status}: {message}")]
  Http {
    status: u16,
    message: String,
    /// Parsed response body, when the server returned JSON.
    body: Option<Value>,
  },

  /// Caller-side misuse detected before any network I/O.
  #[error("validation error: {0}")]
  Validation(String),

  /// A 2xx response whose body could not be decoded.
  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  /// Token or config persistence failure.
  #[error("storage error: {message}")]
  Storage {
    message: String,
    #[source]
    source: Option<std::io::Error>,
  },

  /// Configuration could not be loaded or parsed.
  #[error("config error: {0}")]
  Config(String),
}

impl ApiError {
  /// Classify a `reqwest` error: anything that carries a status is an
  /// HTTP failure, everything else never got a response.
  pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
    match err.status() {
      Some(status) => ApiError::Http {
        status: status.as_u16(),
        message: err.to_string(),
        body: None,
      },
      None => ApiError::Network {
        message: err.to_string(),
      },
    }
  }

  pub(crate) fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
    ApiError::Storage {
      message: message.into(),
      source: Some(source),
    }
  }

  /// Status code for `Http` errors, `None` otherwise.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_network(&self) -> bool {
    matches!(self, ApiError::Network { .. })
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, ApiError::Validation(_))
  }
}
