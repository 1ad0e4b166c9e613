//! Error types for `senator-sync`.

use senator_core::subject::SubjectKind;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// A store call for one subject failed; the run skips that subject.
  #[error("{operation} failed for {kind} {badge}: {source}")]
  Record {
    operation: &'static str,
    kind:      SubjectKind,
    badge:     String,
    #[source]
    source:    BoxError,
  },

  /// The store connection went away; the run cannot continue.
  #[error("store connection lost during {operation}: {source}")]
  Unrecoverable {
    operation: &'static str,
    #[source]
    source:    BoxError,
  },

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),
}

impl Error {
  /// Whether this error must abort the whole run rather than one record.
  pub fn is_fatal(&self) -> bool { !matches!(self, Self::Record { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
