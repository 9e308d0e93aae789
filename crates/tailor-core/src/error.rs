//! Error types for `tailor-core`.

use thiserror::Error;

/// Failure of a capability-port call (network error, timeout, malformed
/// response). Ports share one error shape so the orchestration loop can
/// treat every port uniformly.
#[derive(Debug, Clone, Error)]
#[error("capability call failed: {message}")]
pub struct CapabilityError {
  pub message: String,
}

impl CapabilityError {
  pub fn new(message: impl Into<String>) -> Self {
    Self { message: message.into() }
  }
}
