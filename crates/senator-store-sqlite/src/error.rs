//! Error type for `senator-store-sqlite`.

use senator_core::{store::StoreError, subject::SubjectKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("no {kind} registry entry for badge {badge_number}")]
  EntryNotFound {
    kind:         SubjectKind,
    badge_number: String,
  },
}

impl StoreError for Error {
  fn is_connection_lost(&self) -> bool {
    matches!(self, Self::Database(tokio_rusqlite::Error::ConnectionClosed))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
