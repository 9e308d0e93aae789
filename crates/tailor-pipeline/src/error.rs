//! Error type for `tailor-pipeline`.

use tailor_core::CapabilityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Capability(#[from] CapabilityError),

  #[error("no page schema available for organization {0}")]
  MissingPageSchema(String),
}

impl Error {
  /// Box a backend-specific store error.
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
