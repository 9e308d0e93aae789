//! Error type for `tailor-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown status value: {0:?}")]
  UnknownStatus(String),

  #[error("unknown trigger source value: {0:?}")]
  UnknownTriggerSource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
