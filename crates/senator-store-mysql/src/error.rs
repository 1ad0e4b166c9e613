//! Error type for `senator-store-mysql`.

use senator_core::{store::StoreError, subject::SubjectKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("no {kind} registry entry for badge {badge_number}")]
  EntryNotFound {
    kind:         SubjectKind,
    badge_number: String,
  },
}

impl StoreError for Error {
  fn is_connection_lost(&self) -> bool {
    matches!(
      self,
      Self::Database(
        sqlx::Error::Io(_)
          | sqlx::Error::PoolClosed
          | sqlx::Error::PoolTimedOut
          | sqlx::Error::WorkerCrashed
      )
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
